//! lc-reports CLI - download new reports from the LC gateway.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use lc_reports::Error;

fn hint(error: &Error) -> Option<&'static str> {
    if !error.is_session_fatal() {
        return None;
    }
    Some(match error {
        Error::Authentication { .. } => "Check GATEWAY_USERNAME and GATEWAY_PASSWORD.",
        Error::MissingCredential { .. } => {
            "Set GATEWAY_USERNAME, GATEWAY_PASSWORD, HMAC_USER and HMAC_KEY."
        }
        Error::Protocol { .. } => "The gateway answered in an unexpected format; check the endpoint URLs.",
        _ => "Check the configuration file and command-line options.",
    })
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = lc_reports::cli::run().await {
        eprintln!("{} {e}", console::style("Error:").red().bold());
        if let Some(hint) = hint(&e) {
            eprintln!("{hint}");
        }
        std::process::exit(1);
    }
}
