use std::process::ExitCode;

fn main() -> ExitCode {
    match gitfolio::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            gitfolio::ui::output::error(format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}
