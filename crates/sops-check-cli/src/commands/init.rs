//! Init command implementation.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config_resolver::PROJECT_CONFIG_NAMES;

const DEFAULT_CONFIG: &str = r"# sops-check configuration
#
# Every top-level rule must match the trust anchors (KMS ARNs, PGP
# fingerprints, age recipients, ...) of each SOPS encrypted file.

# Fail when a file carries trust anchors that no rule accounts for.
allowUnmatched: false

rules:
  # The ops team must always be able to decrypt.
  - description: Secrets must be decryptable by the ops team
    url: https://example.com/docs/secrets
    match: age1yt3tfqlfrwdwx0z0ynwplcr6qxcxfaqycuprpmy89nr83ltx74tqdpszlw

  # Exactly one of the regional KMS keys.
  - oneOf:
      - matchRegex: ^arn:aws:kms:eu-central-1:123456789012:key/
      - matchRegex: ^arn:aws:kms:eu-west-1:123456789012:key/

  # Keys that must not be used anymore.
  # - not:
  #     match: 85D77543B3D624B63CEA9E6DBC17301B491B3F21
";

/// Runs the init command.
pub fn run(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(PROJECT_CONFIG_NAMES[0]);

    if config_path.exists() && !force {
        bail!(
            "Configuration file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("Created {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Edit {} to describe your trust anchors", config_path.display());
    println!("  2. Run: sops-check check");

    Ok(())
}
