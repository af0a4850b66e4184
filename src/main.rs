use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    sentinel_rename_lib::run().await
}
