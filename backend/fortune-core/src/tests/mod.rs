mod cancellation;
mod decorator;
mod logger;
mod refresh;
mod retry;
mod support;
