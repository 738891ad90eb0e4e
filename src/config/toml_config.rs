use crate::app::presentation::Palette;
use crate::core::affordability::{AffordabilityModel, TierThresholds, DEFAULT_CUSTOM_LTV_CAP};
use crate::core::aggregator::{SpatialAggregator, ZoomBands, DEFAULT_DETAIL_ZOOM, DEFAULT_SHOW_ZOOM};
use crate::core::cluster::ClusterOptions;
use crate::domain::model::PolicyLoan;
use crate::utils::error::{MapError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_path, validate_range, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub affordability: AffordabilityConfig,
    #[serde(default)]
    pub zoom: ZoomConfig,
    #[serde(default)]
    pub clustering: ClusterOptions,
    #[serde(default = "default_policy_loans")]
    pub policy_loans: Vec<PolicyLoan>,
    #[serde(default)]
    pub presentation: Palette,
    pub data: Option<DataConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffordabilityConfig {
    pub ample: f64,
    pub comfortable: f64,
    pub tight: f64,
    pub custom_ltv_cap: f64,
}

impl Default for AffordabilityConfig {
    fn default() -> Self {
        let thresholds = TierThresholds::default();
        Self {
            ample: thresholds.ample,
            comfortable: thresholds.comfortable,
            tight: thresholds.tight,
            custom_ltv_cap: DEFAULT_CUSTOM_LTV_CAP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub show: i32,
    pub detail: i32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            show: DEFAULT_SHOW_ZOOM,
            detail: DEFAULT_DETAIL_ZOOM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub path: String,
}

fn default_policy_loans() -> Vec<PolicyLoan> {
    vec![PolicyLoan::newborn(), PolicyLoan::newlywed()]
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            affordability: AffordabilityConfig::default(),
            zoom: ZoomConfig::default(),
            clustering: ClusterOptions::default(),
            policy_loans: default_policy_loans(),
            presentation: Palette::default(),
            data: None,
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MapError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MapError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${APT_DATA_DIR})，未設定的變數保留原字串
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| MapError::ConfigValidationError {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn model(&self) -> AffordabilityModel {
        AffordabilityModel::new(
            TierThresholds {
                ample: self.affordability.ample,
                comfortable: self.affordability.comfortable,
                tight: self.affordability.tight,
            },
            self.affordability.custom_ltv_cap,
        )
    }

    pub fn bands(&self) -> ZoomBands {
        ZoomBands {
            show: self.zoom.show,
            detail: self.zoom.detail,
        }
    }

    pub fn aggregator(&self) -> SpatialAggregator {
        SpatialAggregator::new(self.model(), self.bands(), self.clustering)
    }

    pub fn policy_loan(&self, id: &str) -> Option<&PolicyLoan> {
        self.policy_loans.iter().find(|p| p.id == id)
    }

    pub fn data_path(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.path.as_str())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        let a = &self.affordability;
        if !(a.ample > a.comfortable && a.comfortable > a.tight) {
            return Err(MapError::InvalidConfigValueError {
                field: "affordability".to_string(),
                value: format!("{} / {} / {}", a.ample, a.comfortable, a.tight),
                reason: "Thresholds must satisfy ample > comfortable > tight".to_string(),
            });
        }
        // Tight 以上就是買得起；分級邊界必須和預算判斷一致
        if a.tight != 0.0 {
            return Err(MapError::InvalidConfigValueError {
                field: "affordability.tight".to_string(),
                value: a.tight.to_string(),
                reason: "The tight threshold must be 0 (budget equals price)".to_string(),
            });
        }
        validate_range("affordability.custom_ltv_cap", a.custom_ltv_cap, f64::MIN_POSITIVE, 1.0)?;

        if self.zoom.show >= self.zoom.detail {
            return Err(MapError::InvalidConfigValueError {
                field: "zoom".to_string(),
                value: format!("show={} detail={}", self.zoom.show, self.zoom.detail),
                reason: "show must be lower than detail".to_string(),
            });
        }

        let c = &self.clustering;
        validate_range("clustering.radius", c.radius, f64::MIN_POSITIVE, f64::MAX)?;
        validate_range("clustering.extent", c.extent, f64::MIN_POSITIVE, f64::MAX)?;
        validate_range("clustering.max_zoom", c.max_zoom, 0, 24)?;
        validate_range("clustering.min_zoom", c.min_zoom, 0, c.max_zoom)?;
        validate_range("clustering.min_points", c.min_points, 1, usize::MAX)?;
        validate_range("clustering.node_size", c.node_size, 1, usize::MAX)?;

        for (i, loan) in self.policy_loans.iter().enumerate() {
            let field = |name: &str| format!("policy_loans[{}].{}", i, name);
            validate_non_empty_string(&field("id"), &loan.id)?;
            validate_range(&field("max_loan"), loan.max_loan, 0.0, f64::MAX)?;
            validate_range(&field("loan_to_value_ratio"), loan.loan_to_value_ratio, f64::MIN_POSITIVE, 1.0)?;
            validate_range(&field("max_income"), loan.max_income, 0.0, f64::MAX)?;
            validate_range(&field("max_price"), loan.max_price, f64::MIN_POSITIVE, f64::MAX)?;
            validate_range(&field("max_area"), loan.max_area, f64::MIN_POSITIVE, f64::MAX)?;
        }

        if let Some(data) = &self.data {
            validate_path("data.path", &data.path)?;
        }

        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.bands(), ZoomBands::default());
        assert!(config.policy_loan("newborn").is_some());
        assert!(config.policy_loan("newlywed").is_some());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r##"
[affordability]
ample = 3.0
comfortable = 1.0
tight = 0.0
custom_ltv_cap = 0.6

[zoom]
show = 12
detail = 16

[clustering]
radius = 40
max_zoom = 18

[[policy_loans]]
id = "starter"
name = "Starter home"
max_loan = 2.5
ltv = 0.8
max_income = 0.7
max_price = 5.0
max_area = 60.0

[presentation]
ample = "#00ff00"

[data]
path = "./data/deals.csv"
"##;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.model().thresholds.ample, 3.0);
        assert_eq!(config.model().custom_ltv_cap, 0.6);
        assert_eq!(config.bands().show, 12);
        assert_eq!(config.clustering.radius, 40.0);
        assert_eq!(config.clustering.extent, 512.0);
        assert_eq!(config.policy_loans.len(), 1);
        assert_eq!(config.policy_loan("starter").unwrap().loan_to_value_ratio, 0.8);
        assert_eq!(config.presentation.ample, "#00ff00");
        assert_eq!(config.presentation.comfortable, "#fb923c");
        assert_eq!(config.data_path(), Some("./data/deals.csv"));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("AFFORD_MAP_TEST_DATA", "/srv/deals.csv");

        let config = TomlConfig::from_toml_str(
            r#"
[data]
path = "${AFFORD_MAP_TEST_DATA}"
"#,
        )
        .unwrap();
        assert_eq!(config.data_path(), Some("/srv/deals.csv"));

        std::env::remove_var("AFFORD_MAP_TEST_DATA");
    }

    #[test]
    fn test_config_validation() {
        let unordered = TomlConfig::from_toml_str("[affordability]\nample = 0.5\ncomfortable = 1.0\n").unwrap();
        assert!(unordered.validate().is_err());

        let zoom = TomlConfig::from_toml_str("[zoom]\nshow = 15\ndetail = 15\n").unwrap();
        assert!(zoom.validate().is_err());

        let radius = TomlConfig::from_toml_str("[clustering]\nradius = 0\n").unwrap();
        assert!(radius.validate().is_err());

        for tight in ["-1.0", "0.5"] {
            let shifted = TomlConfig::from_toml_str(&format!("[affordability]\ntight = {}\n", tight)).unwrap();
            assert!(shifted.validate().is_err(), "tight = {}", tight);
        }
    }

    #[test]
    fn test_invalid_toml() {
        let err = TomlConfig::from_toml_str("[zoom\nshow = ").unwrap_err();
        assert!(matches!(err, MapError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[zoom]\nshow = 14\ndetail = 17\n").unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.bands().detail, 17);
    }
}
