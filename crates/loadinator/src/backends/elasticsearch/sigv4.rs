//! 🔏 AWS Signature Version 4, for clusters that live behind an AWS front door.
//!
//! Credentials come from `aws-config`'s default chain: env vars → `~/.aws`
//! profiles → web identity → ECS task role → EC2 instance role → hope. The
//! signing itself is `aws-sigv4`'s job; we just hand it the request and copy
//! the headers it gives back.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use aws_config::ConfigLoader;
use aws_credential_types::Credentials;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{PayloadChecksumKind, SignableBody, SignableRequest, SigningSettings, sign};
use aws_sigv4::sign::v4;
use reqwest::header::{HeaderName, HeaderValue};
use tokio::sync::Mutex;
use tracing::debug;

use super::ElasticsearchSinkConfig;

/// ⏳ Temporary credentials this close to expiring are fetched again before signing.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub(crate) struct SigV4Signer {
    provider: SharedCredentialsProvider,
    cached: Arc<Mutex<Option<Credentials>>>,
    region: String,
    service: String,
}

// -- 🔒 the provider and whatever it cached stay out of debug logs
impl std::fmt::Debug for SigV4Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigV4Signer")
            .field("region", &self.region)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl SigV4Signer {
    pub(crate) fn new(
        provider: SharedCredentialsProvider,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            cached: Arc::new(Mutex::new(None)),
            region: region.into(),
            service: service.into(),
        }
    }

    /// 🔑 The standard AWS chain, same as every SDK client would use.
    pub(crate) async fn from_config(config: &ElasticsearchSinkConfig) -> Result<Self> {
        Self::from_loader(config, aws_config::from_env()).await
    }

    /// Region: config, then whatever the chain resolves (`AWS_REGION`, profile), then the cluster hostname.
    pub(crate) async fn from_loader(config: &ElasticsearchSinkConfig, loader: ConfigLoader) -> Result<Self> {
        let sdk_config = loader.load().await;

        let region = config
            .aws_region
            .clone()
            .or_else(|| sdk_config.region().map(|region| region.to_string()))
            .or_else(|| {
                let url = reqwest::Url::parse(&config.url).ok()?;
                region_from_host(url.host_str()?)
            })
            .filter(|region| !region.is_empty())
            .with_context(|| {
                format!(
                    "💀 No AWS region configured and none could be read off '{}'",
                    config.url
                )
            })?;

        let provider = sdk_config
            .credentials_provider()
            .context("💀 The AWS config came back without a credentials provider. Not even a sad one.")?;

        debug!(region = %region, service = %config.aws_service, "🔏 requests will be SigV4 signed");
        Ok(Self::new(provider, region, config.aws_service.clone()))
    }

    /// 🔑 Cached credentials while they're fresh, a trip down the chain when they're not.
    async fn credentials(&self) -> Result<Credentials> {
        let mut cached = self.cached.lock().await;
        if let Some(ref credentials) = *cached {
            let still_fresh = credentials
                .expiry()
                .is_none_or(|expiry| expiry > SystemTime::now() + REFRESH_MARGIN);
            if still_fresh {
                return Ok(credentials.clone());
            }
        }

        let credentials = self
            .provider
            .provide_credentials()
            .await
            .context("💀 No AWS credentials anywhere: not in the env, not in ~/.aws, not on the instance")?;
        *cached = Some(credentials.clone());
        Ok(credentials)
    }

    /// 🔏 Add the signing headers to `request`, as of `now`.
    pub(crate) async fn sign(&self, request: &mut reqwest::Request, now: SystemTime) -> Result<()> {
        let identity = self.credentials().await?.into();

        let mut settings = SigningSettings::default();
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(&self.service)
            .time(now)
            .settings(settings)
            .build()
            .context("💀 Couldn't assemble the SigV4 signing parameters")?
            .into();

        let instructions = {
            let headers = request
                .headers()
                .iter()
                .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)));
            let body = request.body().and_then(|body| body.as_bytes()).unwrap_or_default();
            let signable = SignableRequest::new(
                request.method().as_str(),
                request.url().as_str(),
                headers,
                SignableBody::Bytes(body),
            )
            .context("💀 This request can't be signed as-is")?;
            let (instructions, _signature) = sign(signable, &params)
                .context("💀 SigV4 signing failed")?
                .into_parts();
            instructions
        };

        let headers = request.headers_mut();
        for (name, value) in instructions.headers() {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value).with_context(|| format!("💀 '{name}' is not a valid header value"))?,
            );
        }
        Ok(())
    }
}

/// `search-foo.eu-west-1.es.amazonaws.com` → `eu-west-1`.
pub(crate) fn region_from_host(host: &str) -> Option<String> {
    let labels: Vec<&str> = host.split('.').collect();
    let es_at = labels
        .windows(2)
        .position(|pair| (pair[0] == "es" || pair[0] == "aoss") && pair[1] == "amazonaws")?;
    es_at.checked_sub(1).map(|at| labels[at].to_string())
}
