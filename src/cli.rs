use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use selfcert::ca::{self, CaParams, CaUpdateField};
use selfcert::cert::CertificateWithPrivateKey;
use selfcert::cert::extensions::SubjectAltName;
use selfcert::cert::params::DistinguishedName;
use selfcert::csr::CertificateRequest;
use selfcert::server::{self, CsrParams, ServerParams};
use url::Url;

use crate::config::{CA_CONFIG, FileConfig, SERVER_CONFIG};

const DEFAULT_COUNTRY: &str = "JP";
const DEFAULT_DAYS: u32 = 365;
const CA_CERT_FILE: &str = "ca.crt";
const CA_KEY_FILE: &str = "ca.key";
const SERVER_CERT_FILE: &str = "server.crt";
const SERVER_KEY_FILE: &str = "server.key";
const SERVER_CSR_FILE: &str = "server.csr";

/// Issue a self-signed CA and the server certificates it signs
#[derive(Parser, Debug)]
#[command(name = "selfcert", author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file, instead of searching for ca_config / server_config
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Self-signed certificate authority
    #[command(subcommand)]
    Ca(CaCommand),
    /// Server certificates signed by the CA
    #[command(subcommand)]
    Server(ServerCommand),
}

#[derive(Subcommand, Debug)]
pub enum CaCommand {
    /// Create a CA certificate and private key
    New(CaNewArgs),
    /// Re-sign the CA certificate, bumping the serial number and/or expiry
    Update(CaUpdateArgs),
}

#[derive(Subcommand, Debug)]
pub enum ServerCommand {
    /// Create a server certificate and private key
    New(ServerNewArgs),
    /// Create a server certificate for a certificate signing request
    Csr(ServerCsrArgs),
}

#[derive(Args, Debug)]
pub struct SerialArgs {
    /// Serial number [default: 1]
    #[arg(long, alias = "serialNumber", env = "SELF_CERT_SERIALNUMBER")]
    pub serial_number: Option<u64>,

    /// Validity in days [default: 365]
    #[arg(long, env = "SELF_CERT_DAYS")]
    pub days: Option<u32>,
}

#[derive(Args, Debug)]
pub struct SubjectArgs {
    /// Country (C) [default: JP]
    #[arg(long, env = "SELF_CERT_COUNTRY", value_delimiter = ',')]
    pub country: Option<Vec<String>>,

    /// Organization (O)
    #[arg(long, env = "SELF_CERT_ORGANIZATION", value_delimiter = ',')]
    pub organization: Option<Vec<String>>,

    /// Organizational unit (OU)
    #[arg(
        long,
        alias = "organizationUnit",
        env = "SELF_CERT_ORGANIZATIONUNIT",
        value_delimiter = ','
    )]
    pub organization_unit: Option<Vec<String>>,

    /// Common name (CN)
    #[arg(long, alias = "commonName", env = "SELF_CERT_COMMONNAME")]
    pub common_name: Option<String>,
}

impl SubjectArgs {
    fn resolve(self, file: &FileConfig) -> DistinguishedName {
        DistinguishedName {
            common_name: self.common_name.or_else(|| file.common_name.clone()),
            country: self
                .country
                .or_else(|| file.country.clone())
                .unwrap_or_else(|| vec![DEFAULT_COUNTRY.to_string()]),
            province: Vec::new(),
            locality: Vec::new(),
            organization: self
                .organization
                .or_else(|| file.organization.clone())
                .unwrap_or_default(),
            organizational_unit: self
                .organization_unit
                .or_else(|| file.organization_unit.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Args, Debug)]
pub struct AltNameArgs {
    /// Subject alternative name DNS names
    #[arg(
        long,
        aliases = ["dnsNames", "dnsnames"],
        env = "SELF_CERT_DNSNAMES",
        value_delimiter = ','
    )]
    pub dns_names: Option<Vec<String>>,

    /// Subject alternative name IP addresses
    #[arg(
        long,
        alias = "ipAddresses",
        env = "SELF_CERT_IPADDRESSES",
        value_delimiter = ','
    )]
    pub ip_addresses: Option<Vec<IpAddr>>,

    /// Subject alternative name email addresses
    #[arg(
        long,
        alias = "emailAddresses",
        env = "SELF_CERT_EMAILADDRESSES",
        value_delimiter = ','
    )]
    pub email_addresses: Option<Vec<String>>,

    /// Subject alternative name URIs
    #[arg(long, env = "SELF_CERT_URLS", value_delimiter = ',')]
    pub urls: Option<Vec<Url>>,
}

impl AltNameArgs {
    fn resolve(self, file: &FileConfig) -> SubjectAltName {
        SubjectAltName {
            dns_names: self
                .dns_names
                .or_else(|| file.dns_names.clone())
                .unwrap_or_default(),
            ip_addresses: self
                .ip_addresses
                .or_else(|| file.ip_addresses.clone())
                .unwrap_or_default(),
            email_addresses: self
                .email_addresses
                .or_else(|| file.email_addresses.clone())
                .unwrap_or_default(),
            uris: self
                .urls
                .or_else(|| file.urls.clone())
                .unwrap_or_default()
                .iter()
                .map(Url::to_string)
                .collect(),
        }
    }
}

#[derive(Args, Debug)]
pub struct CaFilesArgs {
    /// CA certificate file [default: ca.crt]
    #[arg(long, alias = "caCert", env = "SELF_CERT_CACERT", value_name = "PATH")]
    pub ca_cert: Option<PathBuf>,

    /// CA private key file [default: ca.key]
    #[arg(long, alias = "caKey", env = "SELF_CERT_CAKEY", value_name = "PATH")]
    pub ca_key: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CaNewArgs {
    #[command(flatten)]
    pub serial: SerialArgs,

    /// RSA key length [default: 2048]
    #[arg(long, env = "SELF_CERT_BITS")]
    pub bits: Option<usize>,

    #[command(flatten)]
    pub subject: SubjectArgs,

    /// Output certificate file [default: ca.crt]
    #[arg(long, env = "SELF_CERT_CERT", value_name = "PATH")]
    pub cert: Option<PathBuf>,

    /// Output private key file [default: ca.key]
    #[arg(long, env = "SELF_CERT_KEY", value_name = "PATH")]
    pub key: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum UpdateField {
    /// Increment the serial number
    Serial,
    /// Extend notAfter by --days
    After,
}

impl From<UpdateField> for CaUpdateField {
    fn from(value: UpdateField) -> Self {
        match value {
            UpdateField::Serial => CaUpdateField::Serial,
            UpdateField::After => CaUpdateField::After,
        }
    }
}

#[derive(Args, Debug)]
pub struct CaUpdateArgs {
    /// Fields to update
    #[arg(value_enum)]
    pub fields: Vec<UpdateField>,

    /// Days added to notAfter by `after` [default: 365]
    #[arg(long, env = "SELF_CERT_DAYS")]
    pub days: Option<u32>,

    /// CA certificate file, rewritten in place [default: ca.crt]
    #[arg(long, env = "SELF_CERT_CERT", value_name = "PATH")]
    pub cert: Option<PathBuf>,

    /// CA private key file, rewritten in place [default: ca.key]
    #[arg(long, env = "SELF_CERT_KEY", value_name = "PATH")]
    pub key: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServerNewArgs {
    #[command(flatten)]
    pub serial: SerialArgs,

    /// RSA key length [default: 2048]
    #[arg(long, env = "SELF_CERT_BITS")]
    pub bits: Option<usize>,

    #[command(flatten)]
    pub subject: SubjectArgs,

    #[command(flatten)]
    pub alt_names: AltNameArgs,

    #[command(flatten)]
    pub ca: CaFilesArgs,

    /// Output certificate file [default: server.crt]
    #[arg(long, env = "SELF_CERT_CERT", value_name = "PATH")]
    pub cert: Option<PathBuf>,

    /// Output private key file [default: server.key]
    #[arg(long, env = "SELF_CERT_KEY", value_name = "PATH")]
    pub key: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServerCsrArgs {
    #[command(flatten)]
    pub serial: SerialArgs,

    #[command(flatten)]
    pub alt_names: AltNameArgs,

    #[command(flatten)]
    pub ca: CaFilesArgs,

    /// Certificate signing request file [default: server.csr]
    #[arg(long, env = "SELF_CERT_CSR", value_name = "PATH")]
    pub csr: Option<PathBuf>,

    /// Output certificate file [default: server.crt]
    #[arg(long, env = "SELF_CERT_CERT", value_name = "PATH")]
    pub cert: Option<PathBuf>,
}

fn path_or(flag: Option<PathBuf>, file: &Option<PathBuf>, default: &str) -> PathBuf {
    flag.or_else(|| file.clone())
        .unwrap_or_else(|| PathBuf::from(default))
}

pub fn run(cli: Cli) -> Result<()> {
    let explicit = cli.config.as_deref();
    match cli.command {
        Commands::Ca(CaCommand::New(args)) => ca_new(args, &FileConfig::load(explicit, CA_CONFIG)?),
        Commands::Ca(CaCommand::Update(args)) => {
            ca_update(args, &FileConfig::load(explicit, CA_CONFIG)?)
        }
        Commands::Server(ServerCommand::New(args)) => {
            server_new(args, &FileConfig::load(explicit, SERVER_CONFIG)?)
        }
        Commands::Server(ServerCommand::Csr(args)) => {
            server_csr(args, &FileConfig::load(explicit, SERVER_CONFIG)?)
        }
    }
}

fn ca_new(args: CaNewArgs, file: &FileConfig) -> Result<()> {
    let cert_path = path_or(args.cert, &file.cert, CA_CERT_FILE);
    let key_path = path_or(args.key, &file.key, CA_KEY_FILE);
    let params = CaParams::builder()
        .maybe_serial_number(args.serial.serial_number.or(file.serial_number))
        .maybe_bits(args.bits.or(file.bits))
        .maybe_days(args.serial.days.or(file.days))
        .subject(args.subject.resolve(file))
        .build();

    let ca = ca::create(&params).context("failed to create CA certificate")?;
    let cert_pem = ca.cert.to_pem()?;
    let key_pem = ca.key.to_pkcs1_pem()?;
    write_files(&[
        (cert_path.as_path(), cert_pem.as_bytes(), false),
        (key_path.as_path(), key_pem.as_bytes(), true),
    ])?;
    tracing::info!(cert = %cert_path.display(), key = %key_path.display(), "wrote CA");
    Ok(())
}

fn ca_update(args: CaUpdateArgs, file: &FileConfig) -> Result<()> {
    let cert_path = path_or(args.cert, &file.cert, CA_CERT_FILE);
    let key_path = path_or(args.key, &file.key, CA_KEY_FILE);
    let days = args.days.or(file.days).unwrap_or(DEFAULT_DAYS);
    let fields: Vec<CaUpdateField> = args.fields.into_iter().map(Into::into).collect();

    let current = load_ca(&cert_path, &key_path)?;
    let updated = ca::update(&current, &fields, days).context("failed to update CA certificate")?;
    let cert_pem = updated.cert.to_pem()?;
    let key_pem = updated.key.to_pkcs1_pem()?;
    write_files(&[
        (cert_path.as_path(), cert_pem.as_bytes(), false),
        (key_path.as_path(), key_pem.as_bytes(), true),
    ])?;
    tracing::info!(cert = %cert_path.display(), key = %key_path.display(), "rewrote CA");
    Ok(())
}

fn server_new(args: ServerNewArgs, file: &FileConfig) -> Result<()> {
    let ca_cert = path_or(args.ca.ca_cert, &file.ca_cert, CA_CERT_FILE);
    let ca_key = path_or(args.ca.ca_key, &file.ca_key, CA_KEY_FILE);
    let cert_path = path_or(args.cert, &file.cert, SERVER_CERT_FILE);
    let key_path = path_or(args.key, &file.key, SERVER_KEY_FILE);
    let params = ServerParams::builder()
        .maybe_serial_number(args.serial.serial_number.or(file.serial_number))
        .maybe_bits(args.bits.or(file.bits))
        .maybe_days(args.serial.days.or(file.days))
        .subject(args.subject.resolve(file))
        .subject_alt_names(args.alt_names.resolve(file))
        .build();

    let ca = load_ca(&ca_cert, &ca_key)?;
    let server = server::issue_new(&ca, &params).context("failed to issue server certificate")?;
    let cert_pem = server.cert.to_pem()?;
    let key_pem = server.key.to_pkcs1_pem()?;
    write_files(&[
        (cert_path.as_path(), cert_pem.as_bytes(), false),
        (key_path.as_path(), key_pem.as_bytes(), true),
    ])?;
    tracing::info!(cert = %cert_path.display(), key = %key_path.display(), "wrote server certificate");
    Ok(())
}

fn server_csr(args: ServerCsrArgs, file: &FileConfig) -> Result<()> {
    let ca_cert = path_or(args.ca.ca_cert, &file.ca_cert, CA_CERT_FILE);
    let ca_key = path_or(args.ca.ca_key, &file.ca_key, CA_KEY_FILE);
    let csr_path = path_or(args.csr, &file.csr, SERVER_CSR_FILE);
    let cert_path = path_or(args.cert, &file.cert, SERVER_CERT_FILE);
    let params = CsrParams::builder()
        .maybe_serial_number(args.serial.serial_number.or(file.serial_number))
        .maybe_days(args.serial.days.or(file.days))
        .subject_alt_names(args.alt_names.resolve(file))
        .build();

    let ca = load_ca(&ca_cert, &ca_key)?;
    let csr_bytes = fs::read(&csr_path)
        .with_context(|| format!("failed to read {}", csr_path.display()))?;
    let csr = CertificateRequest::from_pem_or_der(&csr_bytes)
        .with_context(|| format!("failed to parse {}", csr_path.display()))?;
    let cert = server::issue_from_csr(&ca, &csr, &params)
        .with_context(|| format!("failed to issue certificate for {}", csr_path.display()))?;
    let cert_pem = cert.to_pem()?;
    write_files(&[(cert_path.as_path(), cert_pem.as_bytes(), false)])?;
    tracing::info!(cert = %cert_path.display(), "wrote server certificate");
    Ok(())
}

fn load_ca(cert_path: &Path, key_path: &Path) -> Result<CertificateWithPrivateKey> {
    let cert = fs::read(cert_path)
        .with_context(|| format!("failed to read {}", cert_path.display()))?;
    let key = fs::read_to_string(key_path)
        .with_context(|| format!("failed to read {}", key_path.display()))?;
    CertificateWithPrivateKey::load(&cert, &key).with_context(|| {
        format!(
            "failed to load CA from {} and {}",
            cert_path.display(),
            key_path.display()
        )
    })
}

/// Writes every `(path, contents, private)` output or none of them. Each file
/// is staged next to its target and only renamed into place once all of them
/// were written.
fn write_files(files: &[(&Path, &[u8], bool)]) -> Result<()> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(files.len());
    for &(path, contents, private) in files {
        let temp = staging_path(path);
        let _ = fs::remove_file(&temp);
        if let Err(err) = write_file(&temp, contents, private) {
            let _ = fs::remove_file(&temp);
            discard(&staged);
            return Err(err);
        }
        staged.push((temp, path));
    }
    for (i, (temp, path)) in staged.iter().enumerate() {
        if let Err(err) = fs::rename(temp, path) {
            discard(&staged[i..]);
            return Err(err).with_context(|| format!("failed to replace {}", path.display()));
        }
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".tmp");
    path.with_file_name(name)
}

fn discard(staged: &[(PathBuf, &Path)]) {
    for (temp, _) in staged {
        if let Err(err) = fs::remove_file(temp) {
            tracing::warn!(path = %temp.display(), %err, "failed to remove staged file");
        }
    }
}

fn write_file(path: &Path, contents: &[u8], private: bool) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    if private {
        owner_only(&mut options);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(unix)]
fn owner_only(options: &mut OpenOptions) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(0o600);
}

#[cfg(not(unix))]
fn owner_only(_options: &mut OpenOptions) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("selfcert").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_win_over_config() {
        let cli = parse(&["ca", "new", "--common-name", "Flag CA", "--organization", "A,B"]);
        let Commands::Ca(CaCommand::New(args)) = cli.command else {
            panic!("unexpected command");
        };
        let file = FileConfig {
            common_name: Some("File CA".to_string()),
            organization: Some(vec!["File Org".to_string()]),
            organization_unit: Some(vec!["File Unit".to_string()]),
            ..Default::default()
        };

        let subject = args.subject.resolve(&file);
        assert_eq!(subject.common_name.as_deref(), Some("Flag CA"));
        assert_eq!(subject.organization, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(subject.organizational_unit, vec!["File Unit".to_string()]);
        assert_eq!(subject.country, vec![DEFAULT_COUNTRY.to_string()]);
    }

    #[test]
    fn test_camel_case_aliases() {
        let cli = parse(&[
            "server",
            "new",
            "--serialNumber",
            "5",
            "--dnsNames",
            "a.example.jp,b.example.jp",
            "--ipAddresses",
            "192.0.2.1",
            "--urls",
            "https://example.jp/",
            "--caCert",
            "other.crt",
        ]);
        let Commands::Server(ServerCommand::New(args)) = cli.command else {
            panic!("unexpected command");
        };
        assert_eq!(args.serial.serial_number, Some(5));
        assert_eq!(args.ca.ca_cert, Some(PathBuf::from("other.crt")));

        let alt_names = args.alt_names.resolve(&FileConfig::default());
        assert_eq!(alt_names.dns_names, vec!["a.example.jp", "b.example.jp"]);
        assert_eq!(alt_names.ip_addresses, vec!["192.0.2.1".parse::<IpAddr>().unwrap()]);
        assert_eq!(alt_names.uris, vec!["https://example.jp/"]);
    }

    #[test]
    fn test_rejects_malformed_values() {
        let argv = |extra: &[&str]| {
            let mut argv = vec!["selfcert", "server", "csr"];
            argv.extend_from_slice(extra);
            Cli::try_parse_from(argv)
        };
        assert!(argv(&["--ip-addresses", "300.1.1.1"]).is_err());
        assert!(argv(&["--urls", "not a url"]).is_err());
        assert!(Cli::try_parse_from(["selfcert", "ca", "update", "subject"]).is_err());
    }

    #[test]
    fn test_update_fields() {
        let cli = parse(&["ca", "update", "serial", "after", "--days", "30"]);
        let Commands::Ca(CaCommand::Update(args)) = cli.command else {
            panic!("unexpected command");
        };
        assert_eq!(args.fields, vec![UpdateField::Serial, UpdateField::After]);
        assert_eq!(args.days, Some(30));
    }

    #[test]
    fn test_path_defaults() {
        let file = FileConfig {
            cert: Some(PathBuf::from("from-file.crt")),
            ..Default::default()
        };
        assert_eq!(path_or(None, &file.cert, CA_CERT_FILE), PathBuf::from("from-file.crt"));
        assert_eq!(path_or(None, &file.key, CA_KEY_FILE), PathBuf::from(CA_KEY_FILE));
        assert_eq!(
            path_or(Some(PathBuf::from("flag.crt")), &file.cert, CA_CERT_FILE),
            PathBuf::from("flag.crt")
        );
    }

    #[test]
    fn test_write_private_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.key");
        write_file(&path, b"secret", true).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"secret");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_failed_output_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("ca.crt");
        let key = dir.path().join("missing").join("ca.key");

        let result = write_files(&[
            (cert.as_path(), b"cert".as_slice(), false),
            (key.as_path(), b"key".as_slice(), true),
        ]);
        assert!(result.is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_outputs_replace_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("ca.crt");
        let key = dir.path().join("ca.key");
        fs::write(&cert, b"old cert").unwrap();
        fs::write(&key, b"old key").unwrap();

        write_files(&[
            (cert.as_path(), b"cert".as_slice(), false),
            (key.as_path(), b"key".as_slice(), true),
        ]).unwrap();
        assert_eq!(fs::read(&cert).unwrap(), b"cert");
        assert_eq!(fs::read(&key).unwrap(), b"key");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 2);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&key).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
