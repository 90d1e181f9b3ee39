//! 인벤토리 파일 기반 장치 저장소
//!
//! 관계형 저장소의 세 테이블(장치, 로그 템플릿, 규칙)을 YAML 파일 하나로 표현하고
//! 메모리에서 조인합니다.
//!
//! # 파일 형식
//! ```yaml
//! rules:
//!   - id: 1
//!     pattern: '^(?P<timestamp>\S+ \S+) (?P<hostname>\S+) (?P<ip>\S+) (?P<facility>\d+) (?P<level>\d+)'
//!     log_category: linux-auth
//! templates:
//!   - id: 1
//!     name: linux-default
//!     rules:
//!       auth: 1
//! devices:
//!   - id: 1
//!     name: ubuntu
//!     ip: 192.168.0.58
//!     device_type: Linux
//!     category: server
//!     log_monitoring_enabled: true
//!     template_id: 1
//! ```

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use loghive_core::backend::DeviceRepository;
use loghive_core::error::StoreError;
use loghive_core::types::{DeviceIdentity, DeviceRuleRow, Facility, ParsingRule};

use crate::error::LogPipelineError;

/// 인벤토리 파일 크기 상한
const MAX_INVENTORY_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// 장치 테이블 행
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// 장치 ID
    pub id: i64,
    /// 장치 이름
    pub name: String,
    /// 장치 IP (유일)
    pub ip: IpAddr,
    /// 장치 유형
    pub device_type: String,
    /// 장치 분류
    pub category: String,
    /// 로그 모니터링 여부
    #[serde(default = "default_monitoring")]
    pub log_monitoring_enabled: bool,
    /// 바인딩된 로그 템플릿 ID
    #[serde(default)]
    pub template_id: Option<i64>,
}

fn default_monitoring() -> bool {
    true
}

/// 로그 템플릿 테이블 행 (facility별 규칙 외래 키)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateEntry {
    /// 템플릿 ID
    pub id: i64,
    /// 템플릿 이름
    pub name: String,
    /// facility별 규칙 ID
    #[serde(default)]
    pub rules: HashMap<Facility, i64>,
}

/// 인벤토리 파일 전체
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    /// 규칙 테이블
    #[serde(default)]
    pub rules: Vec<ParsingRule>,
    /// 로그 템플릿 테이블
    #[serde(default)]
    pub templates: Vec<TemplateEntry>,
    /// 장치 테이블
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

impl Inventory {
    /// YAML 문자열을 파싱합니다.
    pub fn parse_yaml(yaml: &str, source: &str) -> Result<Self, LogPipelineError> {
        serde_yaml::from_str(yaml).map_err(|e| LogPipelineError::InventoryLoad {
            path: source.to_owned(),
            reason: format!("YAML parse error: {e}"),
        })
    }

    /// 참조 무결성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        let mut rule_ids = HashSet::new();
        for rule in &self.rules {
            if !rule_ids.insert(rule.id) {
                return Err(invalid(format!("duplicate rule id {}", rule.id)));
            }
            if rule.pattern.is_empty() {
                return Err(invalid(format!("rule {} has an empty pattern", rule.id)));
            }
            if rule.log_category.trim().is_empty() {
                return Err(invalid(format!("rule {} has no log category", rule.id)));
            }
        }

        let mut template_ids = HashSet::new();
        for template in &self.templates {
            if !template_ids.insert(template.id) {
                return Err(invalid(format!("duplicate template id {}", template.id)));
            }
            for (facility, rule_id) in &template.rules {
                if !rule_ids.contains(rule_id) {
                    return Err(invalid(format!(
                        "template {} binds {facility} to unknown rule {rule_id}",
                        template.id
                    )));
                }
            }
        }

        let mut device_ids = HashSet::new();
        let mut device_ips = HashSet::new();
        for device in &self.devices {
            if !device_ids.insert(device.id) {
                return Err(invalid(format!("duplicate device id {}", device.id)));
            }
            if !device_ips.insert(device.ip) {
                return Err(invalid(format!("duplicate device ip {}", device.ip)));
            }
            if let Some(template_id) = device.template_id {
                if !template_ids.contains(&template_id) {
                    return Err(invalid(format!(
                        "device {} references unknown template {template_id}",
                        device.id
                    )));
                }
            }
        }

        Ok(())
    }
}

fn invalid(reason: String) -> LogPipelineError {
    LogPipelineError::InventoryValidation(reason)
}

/// 인벤토리 파일 기반 [`DeviceRepository`]
#[derive(Debug, Default)]
pub struct InventoryRepository {
    devices: HashMap<IpAddr, DeviceEntry>,
    templates: HashMap<i64, TemplateEntry>,
    rules: HashMap<i64, ParsingRule>,
}

impl InventoryRepository {
    /// 검증된 인벤토리로 저장소를 생성합니다.
    pub fn new(inventory: Inventory) -> Result<Self, LogPipelineError> {
        inventory.validate()?;
        Ok(Self {
            devices: inventory
                .devices
                .into_iter()
                .map(|device| (device.ip, device))
                .collect(),
            templates: inventory
                .templates
                .into_iter()
                .map(|template| (template.id, template))
                .collect(),
            rules: inventory
                .rules
                .into_iter()
                .map(|rule| (rule.id, rule))
                .collect(),
        })
    }

    /// YAML 파일에서 저장소를 로드합니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogPipelineError> {
        let path = path.as_ref();
        let load_error = |reason: String| LogPipelineError::InventoryLoad {
            path: path.display().to_string(),
            reason,
        };

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| load_error(format!("failed to read file metadata: {e}")))?;
        if metadata.len() > MAX_INVENTORY_FILE_SIZE {
            return Err(load_error(format!(
                "file too large: {} bytes (max: {MAX_INVENTORY_FILE_SIZE})",
                metadata.len()
            )));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_error(format!("failed to read file: {e}")))?;

        let repository = Self::new(Inventory::parse_yaml(&content, &path.display().to_string())?)?;
        tracing::info!(
            path = %path.display(),
            devices = repository.devices.len(),
            templates = repository.templates.len(),
            rules = repository.rules.len(),
            "inventory loaded"
        );
        Ok(repository)
    }

    /// 등록된 장치 수를 반환합니다.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// IP와 facility로 장치와 규칙을 조인합니다.
    pub fn lookup(&self, ip: IpAddr, facility: Facility) -> Option<DeviceRuleRow> {
        let entry = self.devices.get(&ip)?;
        let rule = entry
            .template_id
            .and_then(|id| self.templates.get(&id))
            .and_then(|template| template.rules.get(&facility))
            .and_then(|rule_id| self.rules.get(rule_id))
            .cloned();

        Some(DeviceRuleRow {
            device: DeviceIdentity {
                id: entry.id,
                name: entry.name.clone(),
                device_type: entry.device_type.clone(),
                category: entry.category.clone(),
                log_monitoring_enabled: entry.log_monitoring_enabled,
            },
            rule,
        })
    }
}

impl DeviceRepository for InventoryRepository {
    async fn resolve(
        &self,
        ip: IpAddr,
        facility: Facility,
    ) -> Result<Option<DeviceRuleRow>, StoreError> {
        Ok(self.lookup(ip, facility))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
rules:
  - id: 1
    pattern: '^(?P<hostname>\S+)'
    log_category: linux-auth
  - id: 2
    pattern: 'CRON\[(?P<pid>\d+)\]'
    log_category: linux-cron
templates:
  - id: 10
    name: linux-default
    rules:
      auth: 1
      cron: 2
devices:
  - id: 100
    name: ubuntu
    ip: 192.168.0.58
    device_type: Linux
    category: server
    template_id: 10
  - id: 101
    name: quiet
    ip: 192.168.0.59
    device_type: Linux
    category: server
    log_monitoring_enabled: false
"#;

    fn repo() -> InventoryRepository {
        InventoryRepository::new(Inventory::parse_yaml(SAMPLE, "inline").unwrap()).unwrap()
    }

    #[test]
    fn joins_device_template_and_rule() {
        let row = repo()
            .lookup("192.168.0.58".parse().unwrap(), Facility::Auth)
            .unwrap();
        assert_eq!(row.device.id, 100);
        assert!(row.device.log_monitoring_enabled);
        assert_eq!(row.rule.unwrap().log_category, "linux-auth");
    }

    #[test]
    fn unbound_facility_has_no_rule() {
        let row = repo()
            .lookup("192.168.0.58".parse().unwrap(), Facility::Kern)
            .unwrap();
        assert!(row.rule.is_none());
    }

    #[test]
    fn device_without_template_has_no_rule() {
        let row = repo()
            .lookup("192.168.0.59".parse().unwrap(), Facility::Auth)
            .unwrap();
        assert!(!row.device.log_monitoring_enabled);
        assert!(row.rule.is_none());
    }

    #[test]
    fn unknown_ip_is_none() {
        assert!(repo().lookup("10.0.0.1".parse().unwrap(), Facility::Auth).is_none());
    }

    #[test]
    fn rejects_unknown_rule_reference() {
        let yaml = r#"
templates:
  - id: 1
    name: broken
    rules:
      auth: 99
"#;
        let err = InventoryRepository::new(Inventory::parse_yaml(yaml, "inline").unwrap())
            .unwrap_err();
        assert!(matches!(err, LogPipelineError::InventoryValidation(_)));
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn rejects_duplicate_ip() {
        let yaml = r#"
devices:
  - { id: 1, name: a, ip: 10.0.0.1, device_type: Linux, category: server }
  - { id: 2, name: b, ip: 10.0.0.1, device_type: Linux, category: server }
"#;
        let err = Inventory::parse_yaml(yaml, "inline").unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("duplicate device ip"));
    }

    #[test]
    fn rejects_unknown_template_reference() {
        let yaml = r#"
devices:
  - { id: 1, name: a, ip: 10.0.0.1, device_type: Linux, category: server, template_id: 5 }
"#;
        let err = Inventory::parse_yaml(yaml, "inline").unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("unknown template"));
    }

    #[test]
    fn rejects_unknown_facility_name() {
        let yaml = r#"
templates:
  - id: 1
    name: t
    rules:
      bogus: 1
"#;
        assert!(matches!(
            Inventory::parse_yaml(yaml, "inline"),
            Err(LogPipelineError::InventoryLoad { .. })
        ));
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let repo = InventoryRepository::from_file(file.path()).await.unwrap();
        assert_eq!(repo.device_count(), 2);

        let row = repo
            .resolve("192.168.0.58".parse().unwrap(), Facility::Cron)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.rule.unwrap().id, 2);
    }

    #[tokio::test]
    async fn missing_file_is_load_error() {
        let err = InventoryRepository::from_file("/nonexistent/loghive/inventory.yml")
            .await
            .unwrap_err();
        assert!(matches!(err, LogPipelineError::InventoryLoad { .. }));
    }

    #[test]
    fn example_inventory_is_valid() {
        let inventory =
            Inventory::parse_yaml(include_str!("../../../../inventory.yml.example"), "example")
                .unwrap();
        let repo = InventoryRepository::new(inventory).unwrap();
        assert_eq!(repo.device_count(), 2);

        let row = repo
            .lookup("192.168.0.58".parse().unwrap(), Facility::Authpriv)
            .unwrap();
        assert_eq!(row.rule.unwrap().log_category, "linux-auth");
    }
}
