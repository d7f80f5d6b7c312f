//! `bollard`-backed container executor (§4.6). Pulls the image if absent,
//! creates a container with the requested namespaces/volumes/environment,
//! runs it to completion, and maps the exit code to an [`ExecutionOutcome`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::Action;

use super::dns::{render_hostname_file, render_hosts, render_resolv_conf};
use super::{ExecutionOutcome, Executor};

const DEFAULT_VOLUME_OPTIONS: [&str; 2] = ["rbind", "rw"];
const IP_FORWARD_PATH: &str = "/proc/sys/net/ipv4/ip_forward";

/// One registry's credentials, as configured via `REGISTRY_CREDENTIALS`.
#[derive(Debug, Clone, serde::Deserialize)]
struct RegistryCredential {
    username: String,
    password: String,
}

pub struct ContainerExecutor {
    docker: Docker,
    /// Working directory relative volume sources resolve against.
    working_dir: PathBuf,
    /// Keyed by exact, scheme-stripped `host[:port]` (§4.6) - never matched
    /// by substring.
    registry_credentials: HashMap<String, RegistryCredential>,
}

impl ContainerExecutor {
    pub fn connect(working_dir: impl Into<PathBuf>) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::Internal(format!("could not connect to docker: {e}")))?;
        Ok(ContainerExecutor {
            docker,
            working_dir: working_dir.into(),
            registry_credentials: load_registry_credentials(),
        })
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        let resolved = resolve_image_name(image);
        let exists = self.docker.inspect_image(&resolved).await.is_ok();
        if exists {
            return Ok(());
        }
        info!(image = %resolved, "pulling image");
        let auth = registry_host(&resolved)
            .map(strip_scheme)
            .and_then(|host| self.registry_credentials.get(host))
            .map(|cred| DockerCredentials {
                username: Some(cred.username.clone()),
                password: Some(cred.password.clone()),
                ..Default::default()
            });
        let options = CreateImageOptions {
            from_image: resolved.as_str(),
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, auth);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| Error::backend_read(anyhow::anyhow!(e.to_string())))?;
        }
        Ok(())
    }

    /// Logs rather than fails when IPv4 forwarding is off - the bridge
    /// network will come up but outbound connectivity from it won't (§4.6).
    async fn check_ipv4_forwarding(&self) {
        match tokio::fs::read_to_string(IP_FORWARD_PATH).await {
            Ok(contents) if contents.trim() == "0" => {
                warn!(
                    path = IP_FORWARD_PATH,
                    "IPv4 forwarding is disabled; bridged containers will have no outbound connectivity"
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(path = IP_FORWARD_PATH, error = %e, "could not check IPv4 forwarding");
            }
        }
    }

    async fn write_dns_files(&self, hostname: &str) -> Result<(PathBuf, PathBuf, PathBuf)> {
        let host_resolv_conf = tokio::fs::read_to_string("/etc/resolv.conf")
            .await
            .unwrap_or_default();

        let dir = self.working_dir.join(format!("dns-{hostname}"));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        let resolv_path = dir.join("resolv.conf");
        let hosts_path = dir.join("hosts");
        let hostname_path = dir.join("hostname");

        tokio::fs::write(&resolv_path, render_resolv_conf(&host_resolv_conf))
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        tokio::fs::write(&hosts_path, render_hosts(hostname))
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        tokio::fs::write(&hostname_path, render_hostname_file(hostname))
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok((resolv_path, hosts_path, hostname_path))
    }

    async fn resolve_volume_binds(&self, specs: &[String]) -> Vec<String> {
        let mut binds = Vec::new();
        for spec in specs {
            if let Some(resolved) = self.resolve_one_volume(spec).await {
                binds.push(resolved);
            }
        }
        binds
    }

    async fn resolve_one_volume(&self, spec: &str) -> Option<String> {
        let (src, dst, opts) = parse_volume_spec(spec)?;

        if !dst.starts_with('/') {
            warn!(spec, "volume destination must be absolute, dropping");
            return None;
        }

        if is_named_volume(&src) {
            warn!(spec, "named volumes are not supported, dropping");
            return None;
        }

        let src_path = Path::new(&src);
        let resolved_src = if src_path.is_absolute() {
            src_path.to_path_buf()
        } else {
            self.working_dir.join(src_path)
        };

        if tokio::fs::metadata(&resolved_src).await.is_err() {
            let _ = tokio::fs::create_dir_all(&resolved_src).await;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = tokio::fs::set_permissions(
                    &resolved_src,
                    std::fs::Permissions::from_mode(0o755),
                )
                .await;
            }
        }

        Some(format!(
            "{}:{}:{}",
            resolved_src.display(),
            dst,
            opts.join(",")
        ))
    }
}

/// Splits `src:dst[:options]`, applying the default option set and
/// last-wins `ro`/`rw` semantics.
fn parse_volume_spec(spec: &str) -> Option<(String, String, Vec<String>)> {
    let mut parts = spec.splitn(3, ':');
    let src = parts.next()?.to_string();
    let dst = parts.next()?.to_string();
    let raw_opts = parts.next();

    let mut opts: Vec<String> = DEFAULT_VOLUME_OPTIONS.iter().map(|s| s.to_string()).collect();
    if let Some(raw) = raw_opts {
        for token in raw.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token {
                "ro" | "rw" => {
                    opts.retain(|o| o != "ro" && o != "rw");
                    opts.push(token.to_string());
                }
                other => opts.push(other.to_string()),
            }
        }
    }
    Some((src, dst, opts))
}

fn is_named_volume(src: &str) -> bool {
    !src.starts_with('/') && !src.starts_with('.')
}

/// The `/`-separated first segment of `image`, if it looks like a registry
/// hostname (a dot, a port, or `localhost`) rather than a Docker Hub
/// org/repo name.
fn registry_host(image: &str) -> Option<&str> {
    let (first_segment, _) = image.split_once('/')?;
    let looks_like_registry =
        first_segment.contains('.') || first_segment.contains(':') || first_segment == "localhost";
    looks_like_registry.then_some(first_segment)
}

fn strip_scheme(host: &str) -> &str {
    host.split_once("://").map_or(host, |(_, rest)| rest)
}

/// Short names (`ubuntu:20.04`) resolve to `docker.io` regardless of a
/// dotted tag; only a `/`-separated registry-hostname segment is taken
/// verbatim.
fn resolve_image_name(image: &str) -> String {
    if registry_host(image).is_some() || image.contains('/') {
        image.to_string()
    } else {
        format!("docker.io/library/{image}")
    }
}

/// Reads `REGISTRY_CREDENTIALS`, a JSON object mapping `host[:port]` to
/// `{"username": ..., "password": ...}`, for use by [`ContainerExecutor::ensure_image`].
/// Absent or malformed configuration yields no credentials rather than an error.
fn load_registry_credentials() -> HashMap<String, RegistryCredential> {
    let raw = match std::env::var("REGISTRY_CREDENTIALS") {
        Ok(raw) => raw,
        Err(_) => return HashMap::new(),
    };
    match serde_json::from_str::<HashMap<String, RegistryCredential>>(&raw) {
        Ok(parsed) => parsed
            .into_iter()
            .map(|(host, cred)| (strip_scheme(&host).to_string(), cred))
            .collect(),
        Err(e) => {
            warn!(error = %e, "REGISTRY_CREDENTIALS is not valid JSON, ignoring");
            HashMap::new()
        }
    }
}

#[async_trait]
impl Executor for ContainerExecutor {
    async fn execute(&self, action: &Action, timeout: Duration) -> Result<ExecutionOutcome> {
        self.ensure_image(&action.image).await?;

        let host_network = action.pid.as_deref() == Some("host");
        let hostname = format!("{}-{}", action.name, action.id);

        let mut mounts = Vec::new();
        if !host_network {
            self.check_ipv4_forwarding().await;
            let (resolv, hosts, hostname_file) = self.write_dns_files(&hostname).await?;
            mounts.push(format!("{}:/etc/resolv.conf:ro", resolv.display()));
            mounts.push(format!("{}:/etc/hosts:ro", hosts.display()));
            mounts.push(format!("{}:/etc/hostname:ro", hostname_file.display()));
        }
        mounts.extend(self.resolve_volume_binds(&action.volumes).await);

        let env: Vec<String> = action
            .environment
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let host_config = HostConfig {
            binds: Some(mounts),
            network_mode: Some(if host_network { "host".to_string() } else { "bridge".to_string() }),
            ..Default::default()
        };

        let config = Config {
            image: Some(resolve_image_name(&action.image)),
            cmd: Some(action.command.clone()),
            env: Some(env),
            host_config: Some(host_config),
            ..Default::default()
        };

        let container_name = format!("forge-{}", action.id);
        let create_options = CreateContainerOptions {
            name: container_name.clone(),
            platform: None,
        };

        self.docker
            .create_container(Some(create_options), config)
            .await
            .map_err(|e| Error::backend_write(anyhow::anyhow!(e.to_string())))?;

        self.docker
            .start_container::<String>(&container_name, None)
            .await
            .map_err(|e| Error::backend_write(anyhow::anyhow!(e.to_string())))?;

        let wait = self.wait_with_deadline(&container_name, timeout).await;

        // Teardown runs on a background budget independent of the caller's
        // deadline so cleanup completes even after a timeout.
        let cleanup_name = container_name.clone();
        let docker = self.docker.clone();
        tokio::spawn(async move {
            let _ = tokio::time::timeout(
                Duration::from_secs(10),
                docker.remove_container(
                    &cleanup_name,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                ),
            )
            .await;
        });

        wait
    }
}

impl ContainerExecutor {
    async fn wait_with_deadline(
        &self,
        container_name: &str,
        timeout: Duration,
    ) -> Result<ExecutionOutcome> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(container_name, Some(options));

        match tokio::time::timeout(timeout, stream.next()).await {
            Err(_) => Err(Error::DeadlineExceeded(format!(
                "container {container_name} did not exit within {timeout:?}"
            ))),
            Ok(None) => Ok(ExecutionOutcome {
                success: false,
                message: "container exited without a status".to_string(),
            }),
            Ok(Some(Err(e))) => Err(Error::backend_read(anyhow::anyhow!(e.to_string()))),
            Ok(Some(Ok(response))) => Ok(ExecutionOutcome {
                success: response.status_code == 0,
                message: response
                    .error
                    .and_then(|e| e.message)
                    .unwrap_or_default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_spec_defaults_to_rbind_rw() {
        let (src, dst, opts) = parse_volume_spec("/data:/mnt").unwrap();
        assert_eq!(src, "/data");
        assert_eq!(dst, "/mnt");
        assert_eq!(opts, vec!["rbind", "rw"]);
    }

    #[test]
    fn ro_option_is_last_wins() {
        let (_, _, opts) = parse_volume_spec("/data:/mnt:rbind,ro").unwrap();
        assert!(opts.contains(&"ro".to_string()));
        assert!(!opts.contains(&"rw".to_string()));
    }

    #[test]
    fn named_volumes_are_detected() {
        assert!(is_named_volume("my-volume"));
        assert!(!is_named_volume("/abs/path"));
        assert!(!is_named_volume("./relative"));
    }

    #[test]
    fn image_resolution_adds_docker_io_for_short_names() {
        assert_eq!(resolve_image_name("busybox"), "docker.io/library/busybox");
        assert_eq!(resolve_image_name("ubuntu:20.04"), "docker.io/library/ubuntu:20.04");
        assert_eq!(
            resolve_image_name("registry.example.com/team/image:v1"),
            "registry.example.com/team/image:v1"
        );
        assert_eq!(
            resolve_image_name("quay.io/tinkerbell-actions/image2disk:v1.0.0"),
            "quay.io/tinkerbell-actions/image2disk:v1.0.0"
        );
    }

    #[test]
    fn registry_host_ignores_org_repo_without_dot_or_port() {
        assert_eq!(registry_host("ubuntu:20.04"), None);
        assert_eq!(registry_host("myteam/myimage"), None);
        assert_eq!(
            registry_host("registry.example.com:5000/team/image:v1"),
            Some("registry.example.com:5000")
        );
        assert_eq!(registry_host("localhost/team/image"), Some("localhost"));
    }

    #[test]
    fn strip_scheme_only_strips_a_leading_scheme() {
        assert_eq!(strip_scheme("https://registry.example.com:5000"), "registry.example.com:5000");
        assert_eq!(strip_scheme("registry.example.com:5000"), "registry.example.com:5000");
    }

    #[test]
    fn credential_lookup_requires_exact_host_port_match() {
        let mut credentials = HashMap::new();
        credentials.insert(
            "registry.example.com:5000".to_string(),
            RegistryCredential {
                username: "u".into(),
                password: "p".into(),
            },
        );

        // Exact host:port match.
        let host = registry_host("registry.example.com:5000/team/image:v1").unwrap();
        assert!(credentials.contains_key(host));

        // A look-alike host must not match by substring.
        let look_alike = registry_host("evil-registry.example.com:5000/team/image:v1").unwrap();
        assert!(!credentials.contains_key(look_alike));
    }
}
