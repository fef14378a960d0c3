//! `causerie config` — show the resolved configuration.

use causerie_config::AppConfig;

pub fn run(config: AppConfig) {
    println!(
        "Fichier de configuration : {}",
        AppConfig::config_dir().join("config.toml").display()
    );
    println!();
    // Debug output redacts the API key.
    println!("{config:#?}");
}
