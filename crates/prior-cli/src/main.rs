//! prior: seal files locally before they are pinned and claimed
//!
//! Commands:
//!   encrypt <file>   - seal a file with a passphrase or a fresh random key
//!   decrypt <file>   - open a sealed envelope
//!   hash <file>      - SHA-256 content hash (the on-chain fingerprint)
//!   verify <file>    - seal, open and compare in memory without writing anything
//!   inspect <file>   - show an envelope's format and sizes
//!   keygen           - write a fresh key bundle
//!   config show      - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use prior_core::config::PriorConfig;
use prior_core::types::{decrypted_path, encrypted_path, key_bundle_filename, ClaimDraft, KeyBundle};
use prior_crypto::{CodecError, ContentKey, EnvelopeFormat, EnvelopeLayout, Secret};

// ── CLI structure ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "prior",
    version,
    about = "PRIOR client-side encryption",
    long_about = "prior: encrypt files locally, fingerprint them, and prepare timestamped claims"
)]
struct Cli {
    /// Path to prior.toml configuration file
    #[arg(long, short = 'c', env = "PRIOR_CONFIG", default_value = "prior.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "PRIOR_LOG")]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "PRIOR_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Seal a file into a .prior-encrypted envelope
    ///
    /// The passphrase is read from PRIOR_PASSPHRASE or prompted for.
    Encrypt {
        /// File to encrypt
        input: PathBuf,
        /// Envelope path (default: <input>.prior-encrypted)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Seal with a fresh random key and write a key bundle instead of using a passphrase
        #[arg(long)]
        random_key: bool,
        /// Write the unmarked pre-versioning layout
        #[arg(long)]
        legacy: bool,
        /// Also write a claim draft (<output>.claim.json) with this assertion
        #[arg(long, value_name = "ASSERTION")]
        claim: Option<String>,
        /// Overwrite an existing envelope or claim draft
        #[arg(long)]
        force: bool,
    },

    /// Open a sealed envelope
    Decrypt {
        /// Envelope to decrypt
        input: PathBuf,
        /// Plaintext path (default: input without .prior-encrypted)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Key bundle or base64 key file for raw-key envelopes
        #[arg(long, conflicts_with = "key")]
        key_file: Option<PathBuf>,
        /// Base64 key for raw-key envelopes
        #[arg(long, env = "PRIOR_KEY", hide_env_values = true)]
        key: Option<String>,
        /// Treat the input as an unmarked pre-versioning envelope
        #[arg(long)]
        legacy: bool,
        /// Overwrite an existing plaintext file
        #[arg(long)]
        force: bool,
    },

    /// Print the SHA-256 content hash of a file
    Hash {
        input: PathBuf,
        /// Print the 0x-prefixed form used for on-chain anchoring
        #[arg(long)]
        anchor: bool,
    },

    /// Encrypt, decrypt and compare a file in memory
    Verify {
        input: PathBuf,
        /// Use a throwaway random key instead of a passphrase
        #[arg(long)]
        random_key: bool,
    },

    /// Show an envelope's format without decrypting it
    Inspect { input: PathBuf },

    /// Generate a random key and write it as a key bundle
    Keygen {
        /// Directory for the bundle (default: config output.key_dir or cwd)
        #[arg(long, short = 'o')]
        out_dir: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PriorConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "prior starting"
    );
    check_config_mode(&config, &cli.config);

    match cli.command {
        Commands::Encrypt { input, output, random_key, legacy, claim, force } => {
            ensure_crypto()?;
            let opts = EncryptOptions { random_key, legacy, claim, force };
            cmd_encrypt(&config, &input, output.as_deref(), &opts).await
        }
        Commands::Decrypt { input, output, key_file, key, legacy, force } => {
            ensure_crypto()?;
            let key = resolve_key(key_file.as_deref(), key.as_deref())?;
            cmd_decrypt(&input, output.as_deref(), key, legacy, force).await
        }
        Commands::Hash { input, anchor } => cmd_hash(&input, anchor),
        Commands::Verify { input, random_key } => {
            ensure_crypto()?;
            cmd_verify(&config, &input, random_key).await
        }
        Commands::Inspect { input } => cmd_inspect(&input),
        Commands::Keygen { out_dir } => {
            ensure_crypto()?;
            cmd_keygen(&config, out_dir.as_deref())
        }
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries hashes and paths for scripts; logs go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[cfg(unix)]
fn check_config_mode(config: &PriorConfig, path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if !config.config_file_mode_check {
        return;
    }
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.permissions().mode() & 0o004 != 0 {
            warn!("config file {} is world-readable", path.display());
        }
    }
}

#[cfg(not(unix))]
fn check_config_mode(_config: &PriorConfig, _path: &Path) {}

/// Startup capability check; a host without working primitives aborts here.
fn ensure_crypto() -> Result<()> {
    prior_crypto::self_test().context("crypto self-test failed; encryption is unavailable")
}

// ── Secrets ───────────────────────────────────────────────────────────────────

/// Read the passphrase from PRIOR_PASSPHRASE or prompt for it.
///
/// `min_len` is enforced when sealing; opening accepts any non-empty value so
/// older envelopes stay readable.
fn read_passphrase(confirm: bool, min_len: Option<usize>) -> Result<SecretString> {
    let passphrase = match std::env::var("PRIOR_PASSPHRASE") {
        Ok(p) => SecretString::from(p),
        Err(_) => {
            let first = SecretString::from(
                rpassword::prompt_password("Passphrase: ").context("reading passphrase")?,
            );
            if confirm {
                let second = SecretString::from(
                    rpassword::prompt_password("Confirm passphrase: ")
                        .context("reading passphrase confirmation")?,
                );
                if first.expose_secret() != second.expose_secret() {
                    anyhow::bail!("passphrases do not match");
                }
            }
            first
        }
    };

    check_passphrase(&passphrase, min_len)?;
    Ok(passphrase)
}

fn check_passphrase(passphrase: &SecretString, min_len: Option<usize>) -> Result<()> {
    let len = passphrase.expose_secret().chars().count();
    if len == 0 {
        anyhow::bail!("passphrase must not be empty");
    }
    if let Some(min) = min_len {
        if len < min {
            anyhow::bail!("passphrase must be at least {min} characters");
        }
    }
    Ok(())
}

/// Resolve a raw key from `--key-file` or `--key`.
fn resolve_key(key_file: Option<&Path>, key: Option<&str>) -> Result<Option<ContentKey>> {
    if let Some(path) = key_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading key file: {}", path.display()))?;
        return Ok(Some(parse_key_file(&content)?));
    }
    key.map(|k| prior_crypto::import_key(k).context("parsing --key"))
        .transpose()
}

/// Key files are either a JSON key bundle or a bare base64 key.
fn parse_key_file(content: &str) -> Result<ContentKey> {
    let encoded = if content.trim_start().starts_with('{') {
        KeyBundle::from_json(content).context("parsing key bundle")?.key
    } else {
        content.trim().to_string()
    };
    prior_crypto::import_key(&encoded).context("parsing key file")
}

/// Authentication failures never say which check failed.
fn codec_error(e: CodecError) -> anyhow::Error {
    match e {
        CodecError::Authentication => {
            anyhow::anyhow!("decryption failed: wrong password or corrupted file")
        }
        other => anyhow::Error::new(other),
    }
}

// ── Progress helpers ──────────────────────────────────────────────────────────

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Run a seal/open on the blocking pool; the KDF alone is ~100k SHA-256 rounds.
async fn run_codec<T, F>(label: &str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CodecError> + Send + 'static,
{
    let pb = make_spinner(label);
    let result = tokio::task::spawn_blocking(f)
        .await
        .context("crypto task panicked")?;
    pb.finish_and_clear();
    result.map_err(codec_error)
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating directory: {}", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing: {}", path.display()))
}

/// Key bundles are written owner-only where the platform allows it.
fn write_secret_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory: {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("writing: {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("restricting permissions: {}", path.display()))?;
    }
    Ok(())
}

/// Refuse to replace an existing file unless `--force` was given.
fn ensure_writable(path: &Path, force: bool) -> Result<()> {
    if !force && path.exists() {
        anyhow::bail!("{} already exists; pass --force to overwrite", path.display());
    }
    Ok(())
}

fn claim_draft_path(envelope_path: &Path) -> PathBuf {
    let mut path = envelope_path.as_os_str().to_owned();
    path.push(".claim.json");
    PathBuf::from(path)
}

fn write_key_bundle(dir: &Path, bundle: &KeyBundle) -> Result<PathBuf> {
    let path = dir.join(key_bundle_filename(chrono::Local::now().date_naive()));
    write_secret_file(&path, &bundle.to_json()?)?;
    Ok(path)
}

fn key_dir(config: &PriorConfig, override_dir: Option<&Path>) -> PathBuf {
    override_dir
        .map(Path::to_path_buf)
        .or_else(|| config.output.key_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."))
}

// ── `prior encrypt` ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct EncryptOptions {
    random_key: bool,
    legacy: bool,
    claim: Option<String>,
    force: bool,
}

/// Remove a key bundle whose envelope never made it to disk.
fn discard_orphan_bundle(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => warn!(path = %path.display(), "envelope not written; removed its key bundle"),
        Err(e) => warn!(
            path = %path.display(),
            error = %e,
            "envelope not written; key bundle left behind opens nothing"
        ),
    }
}

async fn cmd_encrypt(
    config: &PriorConfig,
    input: &Path,
    output: Option<&Path>,
    opts: &EncryptOptions,
) -> Result<()> {
    let layout = if opts.legacy {
        EnvelopeLayout::Legacy
    } else {
        config.crypto.envelope_layout()?
    };

    let assertion = opts.claim.as_deref().map(str::trim);
    if assertion == Some("") {
        anyhow::bail!("claim assertion must not be empty");
    }

    let out_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| encrypted_path(input, config.output.dir.as_deref()));
    let draft_path = claim_draft_path(&out_path);
    ensure_writable(&out_path, opts.force)?;
    if assertion.is_some() {
        ensure_writable(&draft_path, opts.force)?;
    }

    let plaintext = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading: {}", input.display()))?;
    let file_size = plaintext.len() as u64;

    let (envelope, bundle_path) = if opts.random_key {
        let key = prior_crypto::generate_content_key().map_err(codec_error)?;
        let exported = prior_crypto::export_key(&key);
        let envelope = run_codec("encrypt", move || {
            prior_crypto::seal(&plaintext, Secret::Key(&key), layout)
        })
        .await?;

        // Bundle before envelope: no envelope may exist without its key on disk
        let filename = input.file_name().map(|n| n.to_string_lossy().to_string());
        let bundle = KeyBundle::new(exported, filename);
        let bundle_path = write_key_bundle(&key_dir(config, None), &bundle)?;
        (envelope, Some(bundle_path))
    } else {
        let passphrase = read_passphrase(true, Some(config.crypto.min_passphrase_len))?;
        let envelope = run_codec("encrypt", move || {
            prior_crypto::seal(&plaintext, Secret::Passphrase(&passphrase), layout)
        })
        .await?;
        (envelope, None)
    };

    if let Err(e) = write_file(&out_path, &envelope).await {
        if let Some(bundle_path) = &bundle_path {
            discard_orphan_bundle(bundle_path);
        }
        return Err(e);
    }
    let hash = prior_crypto::content_hash(&envelope);

    info!(
        input = %input.display(),
        output = %out_path.display(),
        bytes = envelope.len(),
        ?layout,
        "envelope written"
    );
    if let Some(bundle_path) = &bundle_path {
        println!("Key bundle:   {}", bundle_path.display());
        eprintln!("Keep the key bundle safe: the envelope cannot be opened without it.");
    }
    println!("Encrypted:    {}", out_path.display());
    println!("Size:         {} bytes", envelope.len());
    println!("Content hash: {}", prior_crypto::anchor_hash(&hash));

    if let Some(assertion) = assertion {
        let draft = ClaimDraft::new(&envelope, assertion, file_size);
        let json = serde_json::to_string_pretty(&draft).context("serializing claim draft")?;
        write_file(&draft_path, json.as_bytes()).await?;
        println!("Claim draft:  {}", draft_path.display());
    }

    Ok(())
}

// ── `prior decrypt` ───────────────────────────────────────────────────────────

async fn cmd_decrypt(
    input: &Path,
    output: Option<&Path>,
    key: Option<ContentKey>,
    legacy: bool,
    force: bool,
) -> Result<()> {
    let out_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| decrypted_path(input));
    ensure_writable(&out_path, force)?;

    let envelope = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading: {}", input.display()))?;
    let layout = if legacy {
        EnvelopeLayout::Legacy
    } else {
        EnvelopeLayout::Versioned
    };

    if !legacy && key.is_none() {
        match EnvelopeFormat::detect(&envelope) {
            Some(EnvelopeFormat::Password) => {}
            Some(EnvelopeFormat::RawKey) => {
                anyhow::bail!("{} was sealed with a raw key; pass --key-file or --key", input.display())
            }
            None => anyhow::bail!(
                "{} is not a versioned PRIOR envelope; pass --legacy for envelopes sealed before format markers",
                input.display()
            ),
        }
    }

    let plaintext = match key {
        Some(key) => {
            run_codec("decrypt", move || {
                prior_crypto::open(&envelope, Secret::Key(&key), layout)
            })
            .await?
        }
        None => {
            let passphrase = read_passphrase(false, None)?;
            run_codec("decrypt", move || {
                prior_crypto::open(&envelope, Secret::Passphrase(&passphrase), layout)
            })
            .await?
        }
    };

    write_file(&out_path, &plaintext).await?;

    info!(
        input = %input.display(),
        output = %out_path.display(),
        bytes = plaintext.len(),
        "envelope opened"
    );
    println!("Decrypted: {} ({} bytes)", out_path.display(), plaintext.len());
    Ok(())
}

// ── `prior hash` ──────────────────────────────────────────────────────────────

fn cmd_hash(input: &Path, anchor: bool) -> Result<()> {
    let hash = prior_crypto::content_hash_file(input)?;
    if anchor {
        println!("{}", prior_crypto::anchor_hash(&hash));
    } else {
        println!("{hash}");
    }
    Ok(())
}

// ── `prior verify` ────────────────────────────────────────────────────────────

async fn cmd_verify(config: &PriorConfig, input: &Path, random_key: bool) -> Result<()> {
    let original = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading: {}", input.display()))?;
    let original_hash = prior_crypto::content_hash(&original);
    let layout = config.crypto.envelope_layout()?;

    let (envelope_len, decrypted) = if random_key {
        let key = prior_crypto::generate_content_key().map_err(codec_error)?;
        run_codec("verify", move || {
            let envelope = prior_crypto::seal(&original, Secret::Key(&key), layout)?;
            let opened = prior_crypto::open(&envelope, Secret::Key(&key), layout)?;
            Ok((envelope.len(), opened))
        })
        .await?
    } else {
        let passphrase = read_passphrase(false, None)?;
        run_codec("verify", move || {
            let envelope = prior_crypto::seal(&original, Secret::Passphrase(&passphrase), layout)?;
            let opened = prior_crypto::open(&envelope, Secret::Passphrase(&passphrase), layout)?;
            Ok((envelope.len(), opened))
        })
        .await?
    };

    let decrypted_hash = prior_crypto::content_hash(&decrypted);
    println!("Envelope size:    {envelope_len} bytes");
    println!("Original SHA-256: {original_hash}");
    println!("Decrypted SHA-256: {decrypted_hash}");

    if original_hash != decrypted_hash {
        anyhow::bail!("integrity check failed: decrypted content differs from original");
    }
    println!("Match: yes");
    Ok(())
}

// ── `prior inspect` ───────────────────────────────────────────────────────────

fn cmd_inspect(input: &Path) -> Result<()> {
    let envelope =
        std::fs::read(input).with_context(|| format!("reading: {}", input.display()))?;

    println!("File:         {}", input.display());
    println!("Size:         {} bytes", envelope.len());
    for line in describe_envelope(&envelope) {
        println!("{line}");
    }
    println!(
        "Content hash: {}",
        prior_crypto::anchor_hash(&prior_crypto::content_hash(&envelope))
    );
    Ok(())
}

fn describe_envelope(envelope: &[u8]) -> Vec<String> {
    match EnvelopeFormat::detect(envelope) {
        Some(format) => {
            let overhead = format.min_len(EnvelopeLayout::Versioned);
            vec![
                format!("Format:       {format} (versioned)"),
                format!("Payload:      {} bytes", envelope.len() - overhead),
            ]
        }
        None => vec![
            "Format:       unmarked (legacy envelope or not a PRIOR envelope)".to_string(),
        ],
    }
}

// ── `prior keygen` ────────────────────────────────────────────────────────────

fn cmd_keygen(config: &PriorConfig, out_dir: Option<&Path>) -> Result<()> {
    let key = prior_crypto::generate_content_key().map_err(codec_error)?;
    let bundle = KeyBundle::new(prior_crypto::export_key(&key), None);
    let path = write_key_bundle(&key_dir(config, out_dir), &bundle)?;

    info!(path = %path.display(), "key bundle written");
    println!("{}", path.display());
    Ok(())
}

// ── `prior config show` ───────────────────────────────────────────────────────

fn cmd_config_show(config: &PriorConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
