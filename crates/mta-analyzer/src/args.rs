//! Analyzer command line
//!
//! `analyze --input <path>... --output <path> --target <id>...`, followed by
//! the optional options the configuration sets.

use mta_config::{Configuration, INPUT_OPTION, OUTPUT_OPTION, TARGET_OPTION};

/// List options passed through when present, in order
const LIST_OPTIONS: [&str; 4] = ["source", "packages", "excludePackages", "userRulesDirectory"];

/// Flags passed through only when set
const FLAG_OPTIONS: [&str; 2] = ["sourceMode", "skipReports"];

/// Build the analyzer argument vector for `config`
///
/// An absent `target` falls back to `default_target`. Validation happens
/// elsewhere; missing input or output simply produce no values.
#[must_use]
pub fn build_cli_args(config: &Configuration, default_target: &str) -> Vec<String> {
    let mut args = vec!["analyze".to_string()];

    push_list(&mut args, INPUT_OPTION, config.input());

    args.push(flag(OUTPUT_OPTION));
    if let Some(output) = config.output() {
        args.push(output.to_string());
    }

    let targets = config.list(TARGET_OPTION);
    if targets.is_empty() {
        args.push(flag(TARGET_OPTION));
        args.push(default_target.to_string());
    } else {
        push_list(&mut args, TARGET_OPTION, targets);
    }

    for option in LIST_OPTIONS {
        let values = config.list(option);
        if !values.is_empty() {
            push_list(&mut args, option, values);
        }
    }
    for option in FLAG_OPTIONS {
        if config.flag(option) {
            args.push(flag(option));
        }
    }
    args
}

fn flag(option: &str) -> String {
    format!("--{option}")
}

fn push_list(args: &mut Vec<String>, option: &str, values: &[String]) {
    args.push(flag(option));
    args.extend(values.iter().cloned());
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_config::OptionValue;

    fn config(options: &[(&str, OptionValue)]) -> Configuration {
        let mut config = Configuration::new("args");
        for (name, value) in options {
            config.options.insert((*name).to_string(), value.clone());
        }
        config
    }

    #[test]
    fn default_target_is_used() {
        let config = config(&[
            ("input", OptionValue::list(["/valid/path"])),
            ("output", OptionValue::text("/out")),
        ]);
        assert_eq!(
            build_cli_args(&config, "eap7"),
            vec!["analyze", "--input", "/valid/path", "--output", "/out", "--target", "eap7"]
        );
    }

    #[test]
    fn explicit_targets_replace_default() {
        let config = config(&[
            ("input", OptionValue::list(["/a", "/b"])),
            ("output", OptionValue::text("/out")),
            ("target", OptionValue::list(["eap8", "quarkus"])),
        ]);
        assert_eq!(
            build_cli_args(&config, "eap7"),
            vec![
                "analyze", "--input", "/a", "/b", "--output", "/out", "--target", "eap8",
                "quarkus"
            ]
        );
    }

    #[test]
    fn optional_options_follow_target() {
        let config = config(&[
            ("input", OptionValue::list(["/a"])),
            ("output", OptionValue::text("/out")),
            ("packages", OptionValue::list(["com.acme"])),
            ("source", OptionValue::list(["weblogic"])),
            ("sourceMode", OptionValue::Flag(true)),
            ("skipReports", OptionValue::Flag(false)),
        ]);
        assert_eq!(
            build_cli_args(&config, "eap7"),
            vec![
                "analyze",
                "--input",
                "/a",
                "--output",
                "/out",
                "--target",
                "eap7",
                "--source",
                "weblogic",
                "--packages",
                "com.acme",
                "--sourceMode",
            ]
        );
    }
}
