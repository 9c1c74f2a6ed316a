mod envelope;
mod history;
