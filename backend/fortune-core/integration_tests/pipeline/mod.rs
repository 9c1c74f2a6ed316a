mod auth;
mod headers;
mod history;
mod retry;
