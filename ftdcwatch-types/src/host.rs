//! Host and build facts reported once per FTDC file.

/// Server identity captured from the FTDC metadata document
/// (or the third line of a keyhole stats file).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "camelCase")
)]
pub struct ServerInfo {
    pub host_info: HostInfo,
    pub build_info: BuildInfo,
}

impl ServerInfo {
    /// Check whether anything beyond defaults is known about the host.
    pub fn is_known(&self) -> bool {
        self != &ServerInfo::default()
    }
}

/// `hostInfo` document.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct HostInfo {
    pub os: OsInfo,
    pub system: SystemInfo,
}

/// `hostInfo.os`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct OsInfo {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub os_type: String,
    pub version: String,
}

/// `hostInfo.system`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "camelCase")
)]
pub struct SystemInfo {
    pub cpu_arch: String,
    pub hostname: String,
    pub num_cores: u32,
    #[cfg_attr(feature = "serde", serde(rename = "memSizeMB"))]
    pub mem_size_mb: u64,
}

/// `buildInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BuildInfo {
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_info_is_unknown() {
        assert!(!ServerInfo::default().is_known());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_partial_document() {
        let json = r#"{
            "hostInfo": {
                "system": { "numCores": 8, "memSizeMB": 16384, "hostname": "db1" },
                "os": { "type": "Linux", "name": "Ubuntu", "version": "5.4" }
            },
            "buildInfo": { "version": "4.4.6", "gitVersion": "ignored" }
        }"#;

        let info: ServerInfo = serde_json::from_str(json).unwrap();
        assert!(info.is_known());
        assert_eq!(info.host_info.system.num_cores, 8);
        assert_eq!(info.host_info.system.mem_size_mb, 16384);
        assert_eq!(info.host_info.os.os_type, "Linux");
        assert_eq!(info.build_info.version, "4.4.6");
        assert_eq!(info.host_info.system.cpu_arch, "");
    }
}
