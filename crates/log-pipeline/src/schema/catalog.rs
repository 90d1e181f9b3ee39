//! 기본 제공 로그 분류 스키마 목록
//!
//! 시작 시 한 번 레지스트리에 등록되는 정적 서술자 목록입니다.
//! 분류별 필드는 공통 헤더 필드(`hostname`, `ip`, `facility`, `level`) 뒤에 붙습니다.

use super::SchemaDescriptor;
use super::field::FieldSpec;
use super::field::FieldType::{Boolean, Date, Integer, Ip, Keyword, Text};

/// 모든 분류 스키마가 공유하는 헤더 필드
pub const COMMON_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("hostname", Keyword),
    FieldSpec::new("ip", Ip),
    FieldSpec::new("facility", Integer),
    FieldSpec::new("level", Integer),
];

/// 모든 문서가 가지는 기본 필드
pub const BASE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("id", Keyword),
    FieldSpec::new("dev_id", Integer),
    FieldSpec::new("dev_name", Keyword),
    FieldSpec::new("dev_category", Keyword),
    FieldSpec::new("dev_type", Keyword),
    FieldSpec::new("timestamp", Date),
    FieldSpec::new("ingestion_time", Date),
    FieldSpec::new("log_content", Text),
    FieldSpec::new("status", Boolean),
    FieldSpec::new("log_category", Keyword),
];

/// 파싱 실패 레코드 분류
pub const FAILED_CATEGORY: &str = "failed";

/// 감사 로그 분류
pub const AUDIT_CATEGORY: &str = "audit";

/// 파싱 실패 레코드 스키마
pub const FAILED: SchemaDescriptor = SchemaDescriptor::new(
    FAILED_CATEGORY,
    &[FieldSpec::new("failure_reason", Keyword)],
);

/// 감사 로그 스키마
pub const AUDIT: SchemaDescriptor = SchemaDescriptor::new(
    AUDIT_CATEGORY,
    &[
        FieldSpec::new("event", Keyword),
        FieldSpec::new("actor", Keyword),
        FieldSpec::new("source_ip", Ip),
        FieldSpec::new("detail", Text),
    ],
);

/// 기본 제공 로그 분류 스키마
pub const BUILTIN: &[SchemaDescriptor] = &[
    SchemaDescriptor::new(
        "linux-auth",
        &[
            FieldSpec::new("program", Keyword),
            FieldSpec::new("pid", Integer),
            FieldSpec::new("user", Keyword),
            FieldSpec::new("src_ip", Ip),
            FieldSpec::new("src_port", Integer),
            FieldSpec::new("auth_method", Keyword),
            FieldSpec::new("auth_result", Keyword),
            FieldSpec::new("message", Text),
        ],
    ),
    SchemaDescriptor::new(
        "linux-kernel",
        &[
            FieldSpec::new("uptime", Keyword),
            FieldSpec::new("subsystem", Keyword),
            FieldSpec::new("message", Text),
        ],
    ),
    SchemaDescriptor::new(
        "linux-cron",
        &[
            FieldSpec::new("program", Keyword),
            FieldSpec::new("pid", Integer),
            FieldSpec::new("user", Keyword),
            FieldSpec::new("command", Text),
        ],
    ),
    SchemaDescriptor::new(
        "linux-mail",
        &[
            FieldSpec::new("program", Keyword),
            FieldSpec::new("pid", Integer),
            FieldSpec::new("queue_id", Keyword),
            FieldSpec::new("mail_from", Keyword),
            FieldSpec::new("mail_to", Keyword),
            FieldSpec::new("relay", Keyword),
            FieldSpec::new("delivery_status", Keyword),
            FieldSpec::new("message", Text),
        ],
    ),
    SchemaDescriptor::new(
        "linux-daemon",
        &[
            FieldSpec::new("program", Keyword),
            FieldSpec::new("pid", Integer),
            FieldSpec::new("message", Text),
        ],
    ),
    SchemaDescriptor::new(
        "iptables",
        &[
            FieldSpec::new("log_prefix", Keyword),
            FieldSpec::new("in_iface", Keyword),
            FieldSpec::new("out_iface", Keyword),
            FieldSpec::new("src_ip", Ip),
            FieldSpec::new("dst_ip", Ip),
            FieldSpec::new("protocol", Keyword),
            FieldSpec::new("src_port", Integer),
            FieldSpec::new("dst_port", Integer),
            FieldSpec::new("packet_len", Integer),
        ],
    ),
    SchemaDescriptor::new(
        "windows-security",
        &[
            FieldSpec::new("event_id", Integer),
            FieldSpec::new("user", Keyword),
            FieldSpec::new("domain", Keyword),
            FieldSpec::new("logon_type", Integer),
            FieldSpec::new("src_ip", Ip),
            FieldSpec::new("workstation", Keyword),
            FieldSpec::new("message", Text),
        ],
    ),
    SchemaDescriptor::new(
        "mysql",
        &[
            FieldSpec::new("thread_id", Integer),
            FieldSpec::new("user", Keyword),
            FieldSpec::new("client_host", Keyword),
            FieldSpec::new("database", Keyword),
            FieldSpec::new("command", Keyword),
            FieldSpec::new("query", Text),
        ],
    ),
    SchemaDescriptor::new(
        "postgresql",
        &[
            FieldSpec::new("pid", Integer),
            FieldSpec::new("user", Keyword),
            FieldSpec::new("database", Keyword),
            FieldSpec::new("session_id", Keyword),
            FieldSpec::new("severity", Keyword),
            FieldSpec::new("duration_ms", Integer),
            FieldSpec::new("message", Text),
        ],
    ),
    SchemaDescriptor::new(
        "oracle",
        &[
            FieldSpec::new("session_id", Keyword),
            FieldSpec::new("user", Keyword),
            FieldSpec::new("action", Keyword),
            FieldSpec::new("object_name", Keyword),
            FieldSpec::new("return_code", Integer),
            FieldSpec::new("message", Text),
        ],
    ),
    SchemaDescriptor::new(
        "nginx",
        &[
            FieldSpec::new("client_ip", Ip),
            FieldSpec::new("method", Keyword),
            FieldSpec::new("url", Keyword),
            FieldSpec::new("http_status", Integer),
            FieldSpec::new("bytes_sent", Integer),
            FieldSpec::new("referer", Keyword),
            FieldSpec::new("user_agent", Text),
        ],
    ),
    SchemaDescriptor::new(
        "apache",
        &[
            FieldSpec::new("client_ip", Ip),
            FieldSpec::new("method", Keyword),
            FieldSpec::new("url", Keyword),
            FieldSpec::new("http_status", Integer),
            FieldSpec::new("bytes_sent", Integer),
            FieldSpec::new("referer", Keyword),
            FieldSpec::new("user_agent", Text),
        ],
    ),
    SchemaDescriptor::new(
        "cisco-asa",
        &[
            FieldSpec::new("asa_code", Keyword),
            FieldSpec::new("action", Keyword),
            FieldSpec::new("protocol", Keyword),
            FieldSpec::new("src_ip", Ip),
            FieldSpec::new("src_port", Integer),
            FieldSpec::new("dst_ip", Ip),
            FieldSpec::new("dst_port", Integer),
            FieldSpec::new("message", Text),
        ],
    ),
    SchemaDescriptor::new(
        "huawei-switch",
        &[
            FieldSpec::new("module", Keyword),
            FieldSpec::new("severity", Integer),
            FieldSpec::new("brief", Keyword),
            FieldSpec::new("message", Text),
        ],
    ),
    SchemaDescriptor::new(
        "h3c-switch",
        &[
            FieldSpec::new("module", Keyword),
            FieldSpec::new("severity", Integer),
            FieldSpec::new("mnemonic", Keyword),
            FieldSpec::new("message", Text),
        ],
    ),
    SchemaDescriptor::new(
        "fortigate",
        &[
            FieldSpec::new("log_id", Keyword),
            FieldSpec::new("log_type", Keyword),
            FieldSpec::new("subtype", Keyword),
            FieldSpec::new("action", Keyword),
            FieldSpec::new("src_ip", Ip),
            FieldSpec::new("src_port", Integer),
            FieldSpec::new("dst_ip", Ip),
            FieldSpec::new("dst_port", Integer),
            FieldSpec::new("policy_id", Integer),
            FieldSpec::new("event_time", Date),
        ],
    ),
    SchemaDescriptor::new(
        "paloalto",
        &[
            FieldSpec::new("log_type", Keyword),
            FieldSpec::new("threat_id", Keyword),
            FieldSpec::new("action", Keyword),
            FieldSpec::new("application", Keyword),
            FieldSpec::new("rule_name", Keyword),
            FieldSpec::new("src_zone", Keyword),
            FieldSpec::new("dst_zone", Keyword),
            FieldSpec::new("src_ip", Ip),
            FieldSpec::new("src_port", Integer),
            FieldSpec::new("dst_ip", Ip),
            FieldSpec::new("dst_port", Integer),
        ],
    ),
];
