use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the environment variable that points at an Azure Stack
/// environment document. Consulted only when `AzureStackCloud` is requested
/// by name.
pub const ENVIRONMENT_FILEPATH_VAR: &str = "AZURE_ENVIRONMENT_FILEPATH";

/// A named bundle of Azure endpoints.
///
/// The wire form is the JSON document Azure Stack operators ship alongside
/// their deployments; field names are lower-camel-cased with the original
/// initialisms preserved (`managementPortalURL`, `sqlDatabaseDNSSuffix`).
/// Unknown fields are rejected so that a typo'd override fails loudly
/// instead of silently falling back to an empty endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Environment {
    pub name: String,
    #[serde(rename = "managementPortalURL")]
    pub management_portal_url: String,
    #[serde(rename = "publishSettingsURL")]
    pub publish_settings_url: String,
    #[serde(rename = "serviceManagementEndpoint")]
    pub service_management_endpoint: String,
    #[serde(rename = "resourceManagerEndpoint")]
    pub resource_manager_endpoint: String,
    #[serde(rename = "activeDirectoryEndpoint")]
    pub active_directory_endpoint: String,
    #[serde(rename = "galleryEndpoint")]
    pub gallery_endpoint: String,
    #[serde(rename = "keyVaultEndpoint")]
    pub key_vault_endpoint: String,
    #[serde(rename = "managedHSMEndpoint")]
    pub managed_hsm_endpoint: String,
    #[serde(rename = "graphEndpoint")]
    pub graph_endpoint: String,
    #[serde(rename = "serviceBusEndpoint")]
    pub service_bus_endpoint: String,
    #[serde(rename = "batchManagementEndpoint")]
    pub batch_management_endpoint: String,
    #[serde(rename = "storageEndpointSuffix")]
    pub storage_endpoint_suffix: String,
    #[serde(rename = "cosmosDBDNSSuffix")]
    pub cosmos_db_dns_suffix: String,
    #[serde(rename = "mariaDBDNSSuffix")]
    pub maria_db_dns_suffix: String,
    #[serde(rename = "mySqlDatabaseDNSSuffix")]
    pub mysql_database_dns_suffix: String,
    #[serde(rename = "postgresqlDatabaseDNSSuffix")]
    pub postgresql_database_dns_suffix: String,
    #[serde(rename = "sqlDatabaseDNSSuffix")]
    pub sql_database_dns_suffix: String,
    #[serde(rename = "trafficManagerDNSSuffix")]
    pub traffic_manager_dns_suffix: String,
    #[serde(rename = "keyVaultDNSSuffix")]
    pub key_vault_dns_suffix: String,
    #[serde(rename = "managedHSMDNSSuffix")]
    pub managed_hsm_dns_suffix: String,
    #[serde(rename = "serviceBusEndpointSuffix")]
    pub service_bus_endpoint_suffix: String,
    #[serde(rename = "serviceManagementVMDNSSuffix")]
    pub service_management_vm_dns_suffix: String,
    #[serde(rename = "resourceManagerVMDNSSuffix")]
    pub resource_manager_vm_dns_suffix: String,
    #[serde(rename = "containerRegistryDNSSuffix")]
    pub container_registry_dns_suffix: String,
    #[serde(rename = "tokenAudience")]
    pub token_audience: String,
    #[serde(rename = "resourceIdentifiers")]
    pub resource_identifiers: ResourceIdentifiers,
}

/// Audience URIs for token requests against per-service data planes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceIdentifiers {
    pub graph: String,
    #[serde(rename = "keyVault")]
    pub key_vault: String,
    pub datalake: String,
    pub batch: String,
    #[serde(rename = "operationalInsights")]
    pub operational_insights: String,
    #[serde(rename = "ossRDBMS")]
    pub oss_rdbms: String,
    #[serde(rename = "cosmosDB")]
    pub cosmos_db: String,
    #[serde(rename = "managedHSM")]
    pub managed_hsm: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("unknown Azure environment {0:?}")]
    Unknown(String),

    #[error("{ENVIRONMENT_FILEPATH_VAR} must be set to use AzureStackCloud")]
    MissingFilepath,

    #[error("invalid environment file: {0}")]
    FileInvalid(String),
}

// === impl Environment ===

impl Environment {
    /// Resolves a cloud name (case-insensitively) to its endpoint bundle.
    ///
    /// `AzureStackCloud` is special: the bundle is loaded from the document
    /// named by `AZURE_ENVIRONMENT_FILEPATH`.
    pub fn from_name(name: &str) -> Result<Self, EnvironmentError> {
        match name.to_ascii_lowercase().as_str() {
            "azurecloud" | "azurepubliccloud" => Ok(Self::public_cloud()),
            "azurechinacloud" => Ok(Self::china_cloud()),
            "azuregermancloud" => Ok(Self::german_cloud()),
            "azureusgovernment" | "azureusgovernmentcloud" => Ok(Self::us_government_cloud()),
            "azurestackcloud" => {
                let path = std::env::var(ENVIRONMENT_FILEPATH_VAR)
                    .map_err(|_| EnvironmentError::MissingFilepath)?;
                Self::from_file(path)
            }
            _ => Err(EnvironmentError::Unknown(name.to_string())),
        }
    }

    /// Loads an environment bundle from a JSON document on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EnvironmentError> {
        let raw = std::fs::read(path.as_ref())
            .map_err(|e| EnvironmentError::FileInvalid(e.to_string()))?;
        serde_json::from_slice(&raw).map_err(|e| EnvironmentError::FileInvalid(e.to_string()))
    }

    pub fn public_cloud() -> Self {
        Self {
            name: "AzurePublicCloud".into(),
            management_portal_url: "https://manage.windowsazure.com/".into(),
            publish_settings_url: "https://manage.windowsazure.com/publishsettings/index".into(),
            service_management_endpoint: "https://management.core.windows.net/".into(),
            resource_manager_endpoint: "https://management.azure.com/".into(),
            active_directory_endpoint: "https://login.microsoftonline.com/".into(),
            gallery_endpoint: "https://gallery.azure.com/".into(),
            key_vault_endpoint: "https://vault.azure.net/".into(),
            managed_hsm_endpoint: "https://managedhsm.azure.net/".into(),
            graph_endpoint: "https://graph.windows.net/".into(),
            service_bus_endpoint: "https://servicebus.windows.net/".into(),
            batch_management_endpoint: "https://batch.core.windows.net/".into(),
            storage_endpoint_suffix: "core.windows.net".into(),
            cosmos_db_dns_suffix: "documents.azure.com".into(),
            maria_db_dns_suffix: "mariadb.database.azure.com".into(),
            mysql_database_dns_suffix: "mysql.database.azure.com".into(),
            postgresql_database_dns_suffix: "postgres.database.azure.com".into(),
            sql_database_dns_suffix: "database.windows.net".into(),
            traffic_manager_dns_suffix: "trafficmanager.net".into(),
            key_vault_dns_suffix: "vault.azure.net".into(),
            managed_hsm_dns_suffix: "managedhsm.azure.net".into(),
            service_bus_endpoint_suffix: "servicebus.windows.net".into(),
            service_management_vm_dns_suffix: "cloudapp.net".into(),
            resource_manager_vm_dns_suffix: "cloudapp.azure.com".into(),
            container_registry_dns_suffix: "azurecr.io".into(),
            token_audience: "https://management.azure.com/".into(),
            resource_identifiers: ResourceIdentifiers {
                graph: "https://graph.windows.net/".into(),
                key_vault: "https://vault.azure.net".into(),
                datalake: "https://datalake.azure.net/".into(),
                batch: "https://batch.core.windows.net/".into(),
                operational_insights: "https://api.loganalytics.io".into(),
                oss_rdbms: "https://ossrdbms-aad.database.windows.net".into(),
                cosmos_db: "https://cosmos.azure.com".into(),
                managed_hsm: "https://managedhsm.azure.net".into(),
            },
        }
    }

    pub fn china_cloud() -> Self {
        Self {
            name: "AzureChinaCloud".into(),
            management_portal_url: "https://manage.chinacloudapi.com/".into(),
            publish_settings_url: "https://manage.chinacloudapi.com/publishsettings/index".into(),
            service_management_endpoint: "https://management.core.chinacloudapi.cn/".into(),
            resource_manager_endpoint: "https://management.chinacloudapi.cn/".into(),
            active_directory_endpoint: "https://login.chinacloudapi.cn/".into(),
            gallery_endpoint: "https://gallery.chinacloudapi.cn/".into(),
            key_vault_endpoint: "https://vault.azure.cn/".into(),
            managed_hsm_endpoint: "https://managedhsm.azure.cn/".into(),
            graph_endpoint: "https://graph.chinacloudapi.cn/".into(),
            service_bus_endpoint: "https://servicebus.chinacloudapi.cn/".into(),
            batch_management_endpoint: "https://batch.chinacloudapi.cn/".into(),
            storage_endpoint_suffix: "core.chinacloudapi.cn".into(),
            cosmos_db_dns_suffix: "documents.azure.cn".into(),
            maria_db_dns_suffix: "mariadb.database.chinacloudapi.cn".into(),
            mysql_database_dns_suffix: "mysql.database.chinacloudapi.cn".into(),
            postgresql_database_dns_suffix: "postgres.database.chinacloudapi.cn".into(),
            sql_database_dns_suffix: "database.chinacloudapi.cn".into(),
            traffic_manager_dns_suffix: "trafficmanager.cn".into(),
            key_vault_dns_suffix: "vault.azure.cn".into(),
            managed_hsm_dns_suffix: "managedhsm.azure.cn".into(),
            service_bus_endpoint_suffix: "servicebus.chinacloudapi.cn".into(),
            service_management_vm_dns_suffix: "chinacloudapp.cn".into(),
            resource_manager_vm_dns_suffix: "cloudapp.chinacloudapi.cn".into(),
            container_registry_dns_suffix: "azurecr.cn".into(),
            token_audience: "https://management.chinacloudapi.cn/".into(),
            resource_identifiers: ResourceIdentifiers {
                graph: "https://graph.chinacloudapi.cn/".into(),
                key_vault: "https://vault.azure.cn".into(),
                datalake: "n/a".into(),
                batch: "https://batch.chinacloudapi.cn/".into(),
                operational_insights: "n/a".into(),
                oss_rdbms: "https://ossrdbms-aad.database.chinacloudapi.cn".into(),
                cosmos_db: "https://cosmos.azure.com".into(),
                managed_hsm: "https://managedhsm.azure.cn".into(),
            },
        }
    }

    pub fn german_cloud() -> Self {
        Self {
            name: "AzureGermanCloud".into(),
            management_portal_url: "http://portal.microsoftazure.de/".into(),
            publish_settings_url: "https://manage.microsoftazure.de/publishsettings/index".into(),
            service_management_endpoint: "https://management.core.cloudapi.de/".into(),
            resource_manager_endpoint: "https://management.microsoftazure.de/".into(),
            active_directory_endpoint: "https://login.microsoftonline.de/".into(),
            gallery_endpoint: "https://gallery.cloudapi.de/".into(),
            key_vault_endpoint: "https://vault.microsoftazure.de/".into(),
            managed_hsm_endpoint: "n/a".into(),
            graph_endpoint: "https://graph.cloudapi.de/".into(),
            service_bus_endpoint: "https://servicebus.cloudapi.de/".into(),
            batch_management_endpoint: "https://batch.cloudapi.de/".into(),
            storage_endpoint_suffix: "core.cloudapi.de".into(),
            cosmos_db_dns_suffix: "documents.microsoftazure.de".into(),
            maria_db_dns_suffix: "mariadb.database.cloudapi.de".into(),
            mysql_database_dns_suffix: "mysql.database.cloudapi.de".into(),
            postgresql_database_dns_suffix: "postgres.database.cloudapi.de".into(),
            sql_database_dns_suffix: "database.cloudapi.de".into(),
            traffic_manager_dns_suffix: "azuretrafficmanager.de".into(),
            key_vault_dns_suffix: "vault.microsoftazure.de".into(),
            managed_hsm_dns_suffix: "n/a".into(),
            service_bus_endpoint_suffix: "servicebus.cloudapi.de".into(),
            service_management_vm_dns_suffix: "azurecloudapp.de".into(),
            resource_manager_vm_dns_suffix: "cloudapp.microsoftazure.de".into(),
            container_registry_dns_suffix: "n/a".into(),
            token_audience: "https://management.microsoftazure.de/".into(),
            resource_identifiers: ResourceIdentifiers {
                graph: "https://graph.cloudapi.de/".into(),
                key_vault: "https://vault.microsoftazure.de".into(),
                datalake: "n/a".into(),
                batch: "https://batch.cloudapi.de/".into(),
                operational_insights: "n/a".into(),
                oss_rdbms: "https://ossrdbms-aad.database.cloudapi.de".into(),
                cosmos_db: "https://cosmos.azure.com".into(),
                managed_hsm: "n/a".into(),
            },
        }
    }

    pub fn us_government_cloud() -> Self {
        Self {
            name: "AzureUSGovernmentCloud".into(),
            management_portal_url: "https://manage.windowsazure.us/".into(),
            publish_settings_url: "https://manage.windowsazure.us/publishsettings/index".into(),
            service_management_endpoint: "https://management.core.usgovcloudapi.net/".into(),
            resource_manager_endpoint: "https://management.usgovcloudapi.net/".into(),
            active_directory_endpoint: "https://login.microsoftonline.us/".into(),
            gallery_endpoint: "https://gallery.usgovcloudapi.net/".into(),
            key_vault_endpoint: "https://vault.usgovcloudapi.net/".into(),
            managed_hsm_endpoint: "n/a".into(),
            graph_endpoint: "https://graph.windows.net/".into(),
            service_bus_endpoint: "https://servicebus.usgovcloudapi.net/".into(),
            batch_management_endpoint: "https://batch.core.usgovcloudapi.net/".into(),
            storage_endpoint_suffix: "core.usgovcloudapi.net".into(),
            cosmos_db_dns_suffix: "documents.azure.us".into(),
            maria_db_dns_suffix: "mariadb.database.usgovcloudapi.net".into(),
            mysql_database_dns_suffix: "mysql.database.usgovcloudapi.net".into(),
            postgresql_database_dns_suffix: "postgres.database.usgovcloudapi.net".into(),
            sql_database_dns_suffix: "database.usgovcloudapi.net".into(),
            traffic_manager_dns_suffix: "usgovtrafficmanager.net".into(),
            key_vault_dns_suffix: "vault.usgovcloudapi.net".into(),
            managed_hsm_dns_suffix: "n/a".into(),
            service_bus_endpoint_suffix: "servicebus.usgovcloudapi.net".into(),
            service_management_vm_dns_suffix: "usgovcloudapp.net".into(),
            resource_manager_vm_dns_suffix: "cloudapp.usgovcloudapi.net".into(),
            container_registry_dns_suffix: "azurecr.us".into(),
            token_audience: "https://management.usgovcloudapi.net/".into(),
            resource_identifiers: ResourceIdentifiers {
                graph: "https://graph.windows.net/".into(),
                key_vault: "https://vault.usgovcloudapi.net".into(),
                datalake: "n/a".into(),
                batch: "https://batch.core.usgovcloudapi.net/".into(),
                operational_insights: "https://api.loganalytics.us".into(),
                oss_rdbms: "https://ossrdbms-aad.database.usgovcloudapi.net".into(),
                cosmos_db: "https://cosmos.azure.com".into(),
                managed_hsm: "n/a".into(),
            },
        }
    }

    /// True when this is the public cloud, where the default bootstrap VM
    /// extensions are published.
    pub fn is_public_cloud(&self) -> bool {
        self.name.eq_ignore_ascii_case("AzurePublicCloud")
            || self.name.eq_ignore_ascii_case("AzureCloud")
    }
}
