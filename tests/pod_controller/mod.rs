mod retry_ceiling;
mod stdout_example;
