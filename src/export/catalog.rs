//! Built-in resource catalog
//!
//! Handlers, per-type metadata rows, and the static quirk tables (default-ID
//! skip lists, one-per-scope exceptions, default repairs) for the `criblio`
//! provider.

use super::registry::{MetadataRow, OneOfDescriptor, ResourceHandler, ScopeKind};
use super::schema::{FieldKind, FieldSchema, StructureSchema};
use super::value::Value;

/// Provider name used in required_providers and resource types
pub const PROVIDER_NAME: &str = "criblio";

/// Default provider source
pub const PROVIDER_SOURCE: &str = "criblio/criblio";

/// Default provider version constraint
pub const PROVIDER_VERSION: &str = "~> 1.0";

/// Type name of the scope (group/fleet) type
pub const SCOPE_TYPE: &str = "criblio_group";

/// Type name of packs, listed to reach pack-scoped children
pub const PACK_TYPE: &str = "criblio_pack";

/// Service/method that enumerates scopes for one product
pub const SCOPE_SERVICE: &str = "Groups";
pub const SCOPE_LIST_METHOD: &str = "ListConfigGroupByProduct";
pub const SCOPE_LIST_ROUTE: &str = "/products/{product}/groups";

/// Second endpoint returning a pack pipeline's definition body
pub const PACK_PIPELINE_CONF_METHOD: (&str, &str, &str) = (
    "Pipelines",
    "GetPackPipelineConfByID",
    "/m/{group_id}/p/{pack}/pipelines/{id}/conf",
);

/// Types where an identifier equal to its scope identifier is the valid
/// one-per-scope case
pub const ONE_PER_SCOPE_TYPES: &[&str] = &["criblio_group", "criblio_mapping_ruleset"];

/// Packs shipped with the product
pub const DENIED_PACKS: &[&str] = &["cribl", "cribl-search", "HelloPacks"];

/// Types whose dotted identifiers denote built-in library entries
pub const DOTTED_BUILTIN_TYPES: &[&str] = &[
    "criblio_global_var",
    "criblio_regex",
    "criblio_event_breaker_ruleset",
];

/// Identifier prefixes reserved for built-in objects, per type
pub const DEFAULT_NAMESPACES: &[(&str, &[&str])] =
    &[("criblio_lake_dataset", &["cribl_", "default_"])];

/// Identifiers of built-in objects, per type
pub const DEFAULT_ID_SKIPS: &[(&str, &[&str])] = &[
    ("criblio_destination", &["devnull", "default"]),
    ("criblio_pack_destination", &["devnull", "default"]),
    ("criblio_source", &["CriblLogs", "CriblMetrics", "cribl", "cribl_http", "cribl_tcp"]),
    ("criblio_pipeline", &["passthru"]),
    ("criblio_notification_target", &["system_email"]),
    ("criblio_event_breaker_ruleset", &["Cribl"]),
];

/// Placeholder inserted by a default repair
#[derive(Debug, Clone, Copy)]
pub enum Placeholder {
    EmptyList,
    EmptyMap,
    Text(&'static str),
}

impl Placeholder {
    pub fn to_value(self) -> Value {
        match self {
            Placeholder::EmptyList => Value::List(Vec::new()),
            Placeholder::EmptyMap => Value::Map(Default::default()),
            Placeholder::Text(s) => Value::String(s.to_string()),
        }
    }
}

/// A required-but-often-absent field that must get a schema-valid placeholder
#[derive(Debug, Clone, Copy)]
pub struct Repair {
    pub type_name: &'static str,
    pub path: &'static str,
    pub placeholder: Placeholder,
}

pub const REPAIRS: &[Repair] = &[
    Repair {
        type_name: "criblio_pipeline",
        path: "conf.functions",
        placeholder: Placeholder::EmptyList,
    },
    Repair {
        type_name: "criblio_pack_pipeline",
        path: "conf.functions",
        placeholder: Placeholder::EmptyList,
    },
    Repair {
        type_name: "criblio_routes",
        path: "routes",
        placeholder: Placeholder::EmptyList,
    },
    Repair {
        type_name: "criblio_event_breaker_ruleset",
        path: "rules",
        placeholder: Placeholder::EmptyList,
    },
    Repair {
        type_name: "criblio_lookup_file",
        path: "mode",
        placeholder: Placeholder::Text("memory"),
    },
    Repair {
        type_name: "criblio_mapping_ruleset",
        path: "conf",
        placeholder: Placeholder::EmptyMap,
    },
];

const INPUT_VARIANTS: &[&str] = &[
    "s3", "syslog", "http", "splunk_hec", "tcp", "tcpjson", "kafka", "datagen", "file", "cribl",
    "cribl_http", "cribl_tcp",
];

const OUTPUT_VARIANTS: &[&str] = &[
    "s3", "splunk", "splunk_lb", "webhook", "cribl_lake", "devnull", "router", "default",
];

fn input_one_of() -> OneOfDescriptor {
    OneOfDescriptor::new("type", "input_")
        .skip(&["status", "group_id", "pack"])
        .unsupported(&["cribl", "cribl_http", "cribl_tcp"])
        .alias("tcpjson", "tcp")
        .blocks(&[
            "input_s3",
            "input_syslog",
            "input_http",
            "input_splunk_hec",
            "input_tcp",
            "input_kafka",
            "input_datagen",
            "input_file",
        ])
}

fn output_one_of() -> OneOfDescriptor {
    OneOfDescriptor::new("type", "output_")
        .skip(&["status", "group_id", "pack"])
        .unsupported(&["router", "default"])
        .blocks(&[
            "output_s3",
            "output_splunk",
            "output_splunk_lb",
            "output_webhook",
            "output_cribl_lake",
            "output_devnull",
        ])
}

fn collector_one_of() -> OneOfDescriptor {
    OneOfDescriptor::new("type", "input_collector_")
        .skip(&["group_id"])
        .unsupported(&["executor"])
        .nested("collector.type")
        .blocks(&[
            "input_collector_s3",
            "input_collector_rest",
            "input_collector_azure_blob",
            "input_collector_gcs",
            "input_collector_splunk",
            "input_collector_database",
        ])
}

fn notification_target_one_of() -> OneOfDescriptor {
    OneOfDescriptor::new("type", "").blocks(&[
        "slack_target",
        "pager_duty_target",
        "webhook_target",
        "sns_target",
        "smtp_target",
    ])
}

/// Static metadata, one row per handler
pub const METADATA: &[MetadataRow] = &[
    MetadataRow {
        type_name: "criblio_group",
        service: "Groups",
        list_method: None,
        get_method: Some("GetConfigGroupByProductAndID"),
        id_format: "json:id,product",
        scope: ScopeKind::Scope,
        route: Some("/products/{product}/groups"),
        refresh_shape: None,
        lifecycle_ignore: &["estimated_ingest_rate"],
        one_of: None,
    },
    MetadataRow {
        type_name: "criblio_source",
        service: "Inputs",
        list_method: Some("ListInput"),
        get_method: Some("GetInputByID"),
        id_format: "json:group,id",
        scope: ScopeKind::Group,
        route: Some("/system/inputs"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: Some(input_one_of),
    },
    MetadataRow {
        type_name: "criblio_destination",
        service: "Outputs",
        list_method: Some("ListOutput"),
        get_method: Some("GetOutputByID"),
        id_format: "json:group,id",
        scope: ScopeKind::Group,
        route: Some("/system/outputs"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: Some(output_one_of),
    },
    MetadataRow {
        type_name: "criblio_pipeline",
        service: "Pipelines",
        list_method: Some("ListPipeline"),
        get_method: Some("GetPipelineByID"),
        id_format: "json:group,id",
        scope: ScopeKind::Group,
        route: Some("/pipelines"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: None,
    },
    MetadataRow {
        type_name: "criblio_routes",
        service: "Routes",
        list_method: Some("ListRoutes"),
        get_method: Some("GetRoutesByID"),
        id_format: "json:group,id",
        scope: ScopeKind::Group,
        route: Some("/routes"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: None,
    },
    MetadataRow {
        type_name: "criblio_pack",
        service: "Packs",
        list_method: Some("ListPacks"),
        get_method: Some("GetPacksByID"),
        id_format: "json:group,id",
        scope: ScopeKind::Group,
        route: Some("/packs"),
        refresh_shape: None,
        lifecycle_ignore: &["source"],
        one_of: None,
    },
    MetadataRow {
        type_name: "criblio_pack_pipeline",
        service: "Pipelines",
        list_method: Some("ListPackPipeline"),
        get_method: Some("GetPackPipelineByID"),
        id_format: "json:group,id,pack",
        scope: ScopeKind::Pack,
        route: Some("/pipelines"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: None,
    },
    MetadataRow {
        type_name: "criblio_pack_destination",
        service: "Outputs",
        list_method: Some("ListPackOutput"),
        get_method: Some("GetPackOutputByID"),
        id_format: "json:group,id,pack",
        scope: ScopeKind::Pack,
        route: Some("/system/outputs"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: Some(output_one_of),
    },
    MetadataRow {
        type_name: "criblio_pack_source",
        service: "Inputs",
        list_method: Some("ListPackInput"),
        get_method: Some("GetPackInputByID"),
        id_format: "json:group,id,pack",
        scope: ScopeKind::Pack,
        route: Some("/system/inputs"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: Some(input_one_of),
    },
    MetadataRow {
        type_name: "criblio_collector",
        service: "SavedJobs",
        list_method: Some("ListSavedJob"),
        get_method: Some("GetSavedJobByID"),
        id_format: "json:group,id",
        scope: ScopeKind::Group,
        route: Some("/lib/jobs"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: Some(collector_one_of),
    },
    MetadataRow {
        type_name: "criblio_notification_target",
        service: "NotificationTargets",
        list_method: Some("ListNotificationTarget"),
        get_method: Some("GetNotificationTargetByID"),
        id_format: "id",
        scope: ScopeKind::Global,
        route: Some("/notification-targets"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: Some(notification_target_one_of),
    },
    MetadataRow {
        type_name: "criblio_global_var",
        service: "GlobalVariables",
        list_method: Some("ListGlobalVariable"),
        get_method: Some("GetGlobalVariableByID"),
        id_format: "json:group,id",
        scope: ScopeKind::Group,
        route: Some("/lib/vars"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: None,
    },
    MetadataRow {
        type_name: "criblio_lookup_file",
        service: "Lookups",
        list_method: Some("ListLookupFile"),
        get_method: Some("GetLookupFileByID"),
        id_format: "json:group,id",
        scope: ScopeKind::Group,
        route: Some("/system/lookups"),
        refresh_shape: None,
        lifecycle_ignore: &["size"],
        one_of: None,
    },
    MetadataRow {
        type_name: "criblio_certificate",
        service: "Certificates",
        list_method: Some("ListCertificate"),
        get_method: Some("GetCertificateByID"),
        id_format: "json:group,id",
        scope: ScopeKind::Group,
        route: Some("/system/certificates"),
        refresh_shape: None,
        lifecycle_ignore: &["priv_key", "passphrase"],
        one_of: None,
    },
    MetadataRow {
        type_name: "criblio_regex",
        service: "Regexes",
        list_method: Some("ListRegexLibEntry"),
        get_method: Some("GetRegexLibEntryByID"),
        id_format: "group,id",
        scope: ScopeKind::Group,
        route: Some("/lib/regex"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: None,
    },
    MetadataRow {
        type_name: "criblio_event_breaker_ruleset",
        service: "EventBreakerRules",
        list_method: Some("ListEventBreakerRuleset"),
        get_method: Some("GetEventBreakerRulesetByID"),
        id_format: "json:group,id",
        scope: ScopeKind::Group,
        route: Some("/lib/breakers"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: None,
    },
    MetadataRow {
        type_name: "criblio_mapping_ruleset",
        service: "MappingRulesets",
        list_method: Some("ListMappingRuleset"),
        get_method: Some("GetMappingRulesetByID"),
        id_format: "json:group,id",
        scope: ScopeKind::Group,
        route: Some("/mappings"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: None,
    },
    MetadataRow {
        type_name: "criblio_lake_dataset",
        service: "LakeDatasets",
        list_method: Some("ListCriblLakeDataset"),
        get_method: Some("GetCriblLakeDatasetByLakeIDAndID"),
        id_format: "json:id,lake",
        scope: ScopeKind::Lake,
        route: Some("/datasets"),
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: None,
    },
    MetadataRow {
        type_name: "criblio_commit",
        service: "Versions",
        list_method: None,
        get_method: None,
        id_format: "id",
        scope: ScopeKind::Global,
        route: None,
        refresh_shape: None,
        lifecycle_ignore: &[],
        one_of: None,
    },
];

/// Structure of a pipeline-like object
fn pipeline_structure(name: &str, shape: &str) -> StructureSchema {
    StructureSchema::new(name)
        .string("id")
        .string("group_id")
        .string("pack")
        .map("conf")
        .refreshed_from(shape)
}

/// Structure of a oneOf-bearing object; all payload fields are kept
fn union_structure(name: &str, shape: &str, variants: &[&str]) -> StructureSchema {
    StructureSchema::new(name)
        .string("id")
        .string("type")
        .string("group_id")
        .string("pack")
        .open()
        .variants("type", variants)
        .refreshed_from(shape)
}

/// Every constructible resource handler
pub fn handlers() -> Vec<ResourceHandler> {
    vec![
        ResourceHandler::new(
            "criblio_group",
            StructureSchema::new("ConfigGroupModel")
                .string("id")
                .string("product")
                .string("description")
                .boolean("is_fleet")
                .boolean("on_prem")
                .boolean("worker_remote_access")
                .string("tags")
                .list("streamtags")
                .number("estimated_ingest_rate")
                .refreshed_from("ConfigGroup"),
        ),
        ResourceHandler::new(
            "criblio_source",
            union_structure("InputModel", "GetInputByIDResponse", INPUT_VARIANTS),
        ),
        ResourceHandler::new(
            "criblio_destination",
            union_structure("OutputModel", "GetOutputByIDResponse", OUTPUT_VARIANTS),
        ),
        ResourceHandler::new(
            "criblio_pipeline",
            pipeline_structure("PipelineModel", "GetPipelineByIDResponse"),
        ),
        ResourceHandler::new(
            "criblio_routes",
            StructureSchema::new("RoutesModel")
                .string("id")
                .string("group_id")
                .list("routes")
                .map("groups")
                .list("comments")
                .always_present("routes")
                .refreshed_from("GetRoutesByIDResponse"),
        ),
        ResourceHandler::new(
            "criblio_pack",
            StructureSchema::new("PackModel")
                .string("id")
                .string("group_id")
                .string("description")
                .string("display_name")
                .string("version")
                .string("author")
                .string("source")
                .string("min_log_stream_version")
                .map("tags")
                .refreshed_from("GetPacksByIDResponse"),
        ),
        ResourceHandler::new(
            "criblio_pack_pipeline",
            pipeline_structure("PackPipelineModel", "GetPackPipelineByIDResponse"),
        ),
        ResourceHandler::new(
            "criblio_pack_destination",
            union_structure(
                "PackOutputModel",
                "GetPackOutputByIDResponse",
                OUTPUT_VARIANTS,
            ),
        ),
        ResourceHandler::new(
            "criblio_pack_source",
            union_structure("PackInputModel", "GetPackInputByIDResponse", INPUT_VARIANTS),
        ),
        ResourceHandler::new(
            "criblio_collector",
            union_structure(
                "SavedJobModel",
                "GetSavedJobByIDResponse",
                &["collection", "executor", "scheduledSearch"],
            ),
        ),
        ResourceHandler::new(
            "criblio_notification_target",
            StructureSchema::new("NotificationTargetModel")
                .string("id")
                .string("type")
                .open()
                .refreshed_from("GetNotificationTargetByIDResponse"),
        ),
        ResourceHandler::new(
            "criblio_global_var",
            StructureSchema::new("GlobalVarModel")
                .string("id")
                .string("group_id")
                .string("description")
                .string("type")
                .string("value")
                .string("tags")
                .string("lib")
                .refreshed_from("GetGlobalVariableByIDResponse"),
        ),
        ResourceHandler::new(
            "criblio_lookup_file",
            StructureSchema::new("LookupFileModel")
                .string("id")
                .string("group_id")
                .string("description")
                .string("mode")
                .string("tags")
                .number("size")
                .refreshed_from("GetLookupFileByIDResponse"),
        ),
        ResourceHandler::new(
            "criblio_certificate",
            StructureSchema::new("CertificateModel")
                .string("id")
                .string("group_id")
                .string("description")
                .string("cert")
                .secret("priv_key")
                .secret("passphrase")
                .string("ca")
                .refreshed_from("GetCertificateByIDResponse"),
        ),
        ResourceHandler::new(
            "criblio_regex",
            StructureSchema::new("RegexLibEntryModel")
                .string("id")
                .string("group_id")
                .string("description")
                .string("regex")
                .string("sample_data")
                .string("tags")
                .string("lib")
                .refreshed_from("GetRegexLibEntryByIDResponse"),
        ),
        ResourceHandler::new(
            "criblio_event_breaker_ruleset",
            StructureSchema::new("EventBreakerRulesetModel")
                .string("id")
                .string("group_id")
                .string("description")
                .string("lib")
                .number("min_raw_length")
                .list("rules")
                .string("tags")
                .always_present("rules")
                .refreshed_from("GetEventBreakerRulesetByIDResponse"),
        ),
        ResourceHandler::new(
            "criblio_mapping_ruleset",
            StructureSchema::new("MappingRulesetModel")
                .string("id")
                .string("group_id")
                .boolean("active")
                .map("conf")
                .refreshed_from("GetMappingRulesetByIDResponse"),
        ),
        ResourceHandler::new(
            "criblio_lake_dataset",
            StructureSchema::new("CriblLakeDatasetModel")
                .string("id")
                .string("lake_id")
                .string("description")
                .string("format")
                .string("bucket_name")
                .number("retention_period_in_days")
                .map("search_config")
                .list("accelerated_fields")
                .refreshed_from("GetCriblLakeDatasetByLakeIDAndIDResponse"),
        ),
        ResourceHandler::new(
            "criblio_commit",
            StructureSchema::new("CommitModel")
                .string("id")
                .string("message")
                .field(FieldSchema::new("effective", FieldKind::Bool)),
        ),
    ]
}

/// Default-ID skip list for a type
pub fn default_ids(type_name: &str) -> &'static [&'static str] {
    DEFAULT_ID_SKIPS
        .iter()
        .find(|(t, _)| *t == type_name)
        .map(|(_, ids)| *ids)
        .unwrap_or(&[])
}

/// Reserved identifier prefixes for a type
pub fn default_namespaces(type_name: &str) -> &'static [&'static str] {
    DEFAULT_NAMESPACES
        .iter()
        .find(|(t, _)| *t == type_name)
        .map(|(_, prefixes)| *prefixes)
        .unwrap_or(&[])
}

/// Default repairs for a type
pub fn repairs_for(type_name: &str) -> impl Iterator<Item = &'static Repair> + '_ {
    REPAIRS.iter().filter(move |r| r.type_name == type_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_handler_has_exactly_one_row() {
        let handler_types: HashSet<String> =
            handlers().into_iter().map(|h| h.type_name).collect();
        let row_types: HashSet<String> =
            METADATA.iter().map(|r| r.type_name.to_string()).collect();

        assert_eq!(handler_types, row_types);
        assert_eq!(METADATA.len(), row_types.len());
    }

    #[test]
    fn test_one_of_variants_cover_supported_and_unsupported() {
        let descriptor = input_one_of();
        for value in &descriptor.unsupported {
            assert!(INPUT_VARIANTS.contains(&value.as_str()));
        }
        assert!(descriptor.supports_block("input_s3"));
    }

    #[test]
    fn test_quirk_lookups() {
        assert!(default_ids("criblio_destination").contains(&"devnull"));
        assert!(default_ids("criblio_routes").is_empty());
        assert_eq!(default_namespaces("criblio_lake_dataset"), &["cribl_", "default_"]);
        assert_eq!(repairs_for("criblio_pipeline").count(), 1);
    }
}
