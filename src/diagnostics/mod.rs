//! Host diagnostics reported by `GET /`.
//!
//! Nothing in here fails a request: every lookup that goes wrong becomes a
//! warning string next to whatever could still be collected.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::format_file_size;

/// Public IP and geolocation of the host
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IpInfo {
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub loc: Option<String>,
    pub org: Option<String>,
    pub timezone: Option<String>,
}

/// Memory counters in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total: u64,
    pub available: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_memory: Option<String>,
}

/// Everything `GET /` reports
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<IpInfo>,
    pub system: SystemInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Collect the diagnostics report
pub async fn collect(client: &reqwest::Client, ip_info_url: &str, timeout: Duration) -> Report {
    let mut warnings = Vec::new();

    let host = match fetch_ip_info(client, ip_info_url, timeout).await {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::warn!(error = %e, "IP lookup failed");
            warnings.push(format!("IP info unavailable: {}", e));
            None
        }
    };

    let memory = match read_memory().await {
        Ok(memory) => Some(memory),
        Err(e) => {
            tracing::warn!(error = %e, "Memory lookup failed");
            warnings.push(format!("Memory info unavailable: {}", e));
            None
        }
    };

    let system = SystemInfo {
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        family: std::env::consts::FAMILY,
        kernel: read_kernel_release().await,
        total_memory: memory.map(|m| format_file_size(m.total)),
        available_memory: memory.map(|m| format_file_size(m.available)),
    };

    Report {
        host,
        system,
        warning: (!warnings.is_empty()).then(|| warnings.join("; ")),
    }
}

async fn fetch_ip_info(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> anyhow::Result<IpInfo> {
    let response = client.get(url).timeout(timeout).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }

    Ok(response.json::<IpInfo>().await?)
}

async fn read_memory() -> anyhow::Result<MemoryInfo> {
    let meminfo = tokio::fs::read_to_string("/proc/meminfo").await?;
    parse_meminfo(&meminfo).ok_or_else(|| anyhow::anyhow!("unrecognised /proc/meminfo format"))
}

async fn read_kernel_release() -> Option<String> {
    tokio::fs::read_to_string("/proc/sys/kernel/osrelease")
        .await
        .ok()
        .map(|release| release.trim().to_string())
        .filter(|release| !release.is_empty())
}

/// Parse `MemTotal` and `MemAvailable` (reported in kB) out of `/proc/meminfo`
pub fn parse_meminfo(content: &str) -> Option<MemoryInfo> {
    let field = |name: &str| {
        content.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
            Some(kb * 1024)
        })
    };

    let total = field("MemTotal")?;
    // kernels before 3.14 lack MemAvailable
    let available = field("MemAvailable").or_else(|| field("MemFree"))?;

    Some(MemoryInfo { total, available })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MEMINFO: &str = "MemTotal:       16316412 kB\n\
                           MemFree:          512000 kB\n\
                           MemAvailable:    8158206 kB\n\
                           Buffers:          123456 kB\n";

    #[test]
    fn test_parse_meminfo() {
        let memory = parse_meminfo(MEMINFO).unwrap();
        assert_eq!(memory.total, 16316412 * 1024);
        assert_eq!(memory.available, 8158206 * 1024);
    }

    #[test]
    fn test_parse_meminfo_without_available() {
        let memory = parse_meminfo("MemTotal: 1024 kB\nMemFree: 512 kB\n").unwrap();
        assert_eq!(memory.available, 512 * 1024);
    }

    #[test]
    fn test_parse_meminfo_garbage() {
        assert_eq!(parse_meminfo("nothing useful"), None);
        assert_eq!(parse_meminfo("MemTotalish: 12 kB"), None);
    }

    #[tokio::test]
    async fn test_collect_with_ip_service() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ip": "203.0.113.7",
                "city": "Nairobi",
                "country": "KE",
                "org": "AS0 Example",
                "readme": "https://ipinfo.io/missingauth"
            })))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/json", server.uri());
        let report = collect(&client, &url, Duration::from_secs(5)).await;

        let host = report.host.unwrap();
        assert_eq!(host.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(host.country.as_deref(), Some("KE"));
        assert_eq!(report.system.os, std::env::consts::OS);
    }

    #[tokio::test]
    async fn test_collect_degrades_to_warning() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let report = collect(&client, &server.uri(), Duration::from_secs(5)).await;

        assert!(report.host.is_none());
        assert!(report.warning.unwrap().contains("IP info unavailable"));
    }
}
