/// Runtime configuration for the workspace and the login helper
///
/// Defaults match the production extension. The JS entry points may pass a
/// JSON override; any field left out keeps its default.
use crate::table::DEFAULT_VISIBLE_ROW_CAP;
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelConfig {
    pub ims: ImsConfig,
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImsConfig {
    pub client_id: String,
    pub scope: String,
    pub locale: String,
    pub authorize_url: String,
    pub profile_url: String,
    pub organizations_url: String,
    pub pps_profile_base_url: String,
    pub redirect_uri: String,
    /// Client ids tried in order when probing the profile endpoint.
    pub profile_client_ids: Vec<String>,
}

impl Default for ImsConfig {
    fn default() -> Self {
        ImsConfig {
            client_id: "adobeExperienceCloudDebugger".to_string(),
            scope: [
                "AdobeID",
                "openid",
                "avatar",
                "session",
                "read_organizations",
                "additional_info.job_function",
                "additional_info.projectedProductContext",
                "additional_info.account_type",
                "additional_info.roles",
                "additional_info.user_image_url",
                "analytics_services",
            ]
            .join(","),
            locale: "en_US".to_string(),
            authorize_url: "https://ims-na1.adobelogin.com/ims/authorize/v1".to_string(),
            profile_url: "https://ims-na1.adobelogin.com/ims/profile/v1".to_string(),
            organizations_url: "https://ims-na1.adobelogin.com/ims/organizations/v5".to_string(),
            pps_profile_base_url: "https://pps.services.adobe.com".to_string(),
            redirect_uri: "https://login.aepdebugger.adobe.com".to_string(),
            profile_client_ids: vec![
                "adobeExperienceCloudDebugger".to_string(),
                "AdobePass1".to_string(),
            ],
        }
    }
}

impl ImsConfig {
    /// Scheme and host of the identity service, e.g. `https://ims-na1.adobelogin.com`.
    pub fn base_url(&self) -> &str {
        self.authorize_url
            .split("/ims/")
            .next()
            .unwrap_or(&self.authorize_url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceConfig {
    pub pass_console_programmers_url: String,
    pub visible_row_cap: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        WorkspaceConfig {
            pass_console_programmers_url:
                "https://experience.adobe.com/#/@adobepass/pass/authentication/release-production/programmers"
                    .to_string(),
            visible_row_cap: DEFAULT_VISIBLE_ROW_CAP,
        }
    }
}

impl PanelConfig {
    /// Parse an optional JSON override. Bad input is logged and ignored.
    pub fn from_json(raw: Option<&str>) -> PanelConfig {
        let Some(text) = raw.map(str::trim).filter(|text| !text.is_empty()) else {
            return PanelConfig::default();
        };
        serde_json::from_str(text).unwrap_or_else(|e| {
            warn!("Ignoring invalid panel config: {}", e);
            PanelConfig::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PanelConfig::default();
        assert_eq!(config.ims.base_url(), "https://ims-na1.adobelogin.com");
        assert_eq!(config.ims.profile_client_ids.len(), 2);
        assert!(config.ims.scope.starts_with("AdobeID,openid,avatar"));
        assert_eq!(config.workspace.visible_row_cap, 10);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = PanelConfig::from_json(Some(
            r#"{"ims": {"clientId": "custom"}, "workspace": {"visibleRowCap": 5}}"#,
        ));
        assert_eq!(config.ims.client_id, "custom");
        assert_eq!(config.ims.locale, "en_US");
        assert_eq!(config.workspace.visible_row_cap, 5);
    }

    #[test]
    fn test_invalid_json_falls_back() {
        assert_eq!(PanelConfig::from_json(Some("{not json")), PanelConfig::default());
        assert_eq!(PanelConfig::from_json(None), PanelConfig::default());
        assert_eq!(PanelConfig::from_json(Some("  ")), PanelConfig::default());
    }
}
