//! The `quizforge init` command.

use anyhow::Result;

use quizforge_providers::config::CONFIG_FILE_NAME;

pub fn execute() -> Result<()> {
    if std::path::Path::new(CONFIG_FILE_NAME).exists() {
        println!("{CONFIG_FILE_NAME} already exists, skipping.");
    } else {
        std::fs::write(CONFIG_FILE_NAME, SAMPLE_CONFIG)?;
        println!("Created {CONFIG_FILE_NAME}");
    }

    println!("\nNext steps:");
    println!("  1. Set GEMINI_API_KEY, or leave it unset to use the built-in question generator");
    println!("  2. Run: quizforge generate --student <uuid> --subject PHYS-101 --count 5");
    println!("  3. Run: quizforge show --student <uuid> --test <test id>");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# quizforge configuration

endpoint_timeout_secs = 8
temperature = 0.4
default_language = "ru"

[provider]
type = "gemini"
api_key = "${GEMINI_API_KEY}"
model = "gemini-1.5-flash"
api_versions = ["v1", "v1beta"]
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use quizforge_providers::config::QuizforgeConfig;

    #[test]
    fn sample_config_parses() {
        let config: QuizforgeConfig = toml::from_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.endpoint_timeout_secs, 8);
        assert!(config.provider.is_some());
    }
}
