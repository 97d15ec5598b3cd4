//! Pre-flight checks before an analyzer is spawned

use crate::error::ValidationError;
use mta_config::Configuration;

/// Check that `config` can be analyzed
///
/// Requires at least one input, every input to exist on disk, an output
/// directory, and no repository fetch in flight.
///
/// # Errors
/// - `ValidationError` describing the first problem found
pub async fn validate_configuration(config: &Configuration) -> Result<(), ValidationError> {
    if !config.cloning.is_empty() {
        return Err(ValidationError::CloningInProgress {
            count: config.cloning.len(),
        });
    }

    let input = config.input();
    if input.is_empty() {
        return Err(ValidationError::MissingInput);
    }
    for path in input {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(ValidationError::InputNotFound(path.clone()));
        }
    }

    match config.output() {
        Some(output) if !output.trim().is_empty() => Ok(()),
        _ => Err(ValidationError::MissingOutput),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_config::OptionValue;

    fn config_with(input: &[&str], output: Option<&str>) -> Configuration {
        let mut config = Configuration::new("validate");
        if !input.is_empty() {
            config
                .options
                .insert("input".into(), OptionValue::list(input.iter().copied()));
        }
        if let Some(output) = output {
            config.options.insert("output".into(), OptionValue::text(output));
        }
        config
    }

    #[tokio::test]
    async fn accepts_existing_input_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().to_string_lossy().into_owned();
        let config = config_with(&[&input], Some("/out"));
        assert_eq!(validate_configuration(&config).await, Ok(()));
    }

    #[tokio::test]
    async fn rejects_missing_input() {
        let config = config_with(&[], Some("/out"));
        assert_eq!(
            validate_configuration(&config).await,
            Err(ValidationError::MissingInput)
        );
    }

    #[tokio::test]
    async fn rejects_nonexistent_input() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone").to_string_lossy().into_owned();
        let config = config_with(&[&missing], Some("/out"));
        assert_eq!(
            validate_configuration(&config).await,
            Err(ValidationError::InputNotFound(missing))
        );
    }

    #[tokio::test]
    async fn rejects_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().to_string_lossy().into_owned();
        let config = config_with(&[&input], None);
        assert_eq!(
            validate_configuration(&config).await,
            Err(ValidationError::MissingOutput)
        );
    }

    #[tokio::test]
    async fn rejects_while_cloning() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().to_string_lossy().into_owned();
        let mut config = config_with(&[&input], Some("/out"));
        config.cloning.insert("https://example.com/app.git".into());
        assert_eq!(
            validate_configuration(&config).await,
            Err(ValidationError::CloningInProgress { count: 1 })
        );
    }
}
