use crate::{
    config::Environment,
    error::{AppResult, TracingSnafu},
};
use snafu::ResultExt;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// `RUST_LOG` wins when set, otherwise the level follows the environment.
fn filter(environment: Environment) -> EnvFilter {
    let default_level = match environment {
        Environment::Local | Environment::Dev => "debug",
        Environment::Prod => "info",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

pub fn init(environment: Environment) -> AppResult<()> {
    let builder = FmtSubscriber::builder().with_env_filter(filter(environment));

    match environment {
        Environment::Local => tracing::subscriber::set_global_default(builder.finish()),
        Environment::Dev | Environment::Prod => {
            tracing::subscriber::set_global_default(builder.json().finish())
        }
    }
    .context(TracingSnafu)
}
