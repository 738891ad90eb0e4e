#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli_args::{CliConfig, LoanKind};

#[cfg(feature = "cli")]
mod cli_args {
    use crate::config::toml_config::TomlConfig;
    use crate::core::summary::RecordFilter;
    use crate::domain::model::{BoundingBox, BuyerState, CustomLoan, FinancingConfig, ViewState};
    use crate::utils::error::{MapError, Result};
    use crate::utils::validation::{
        validate_finite, validate_non_negative, validate_path, validate_positive, Validate,
    };
    use clap::{Parser, ValueEnum};
    use serde::{Deserialize, Serialize};

    /// 南韓首都圈的大致範圍，沒有給 --bbox 時使用
    const DEFAULT_BBOX: [f64; 4] = [126.7, 37.4, 127.2, 37.7];

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
    #[serde(rename_all = "snake_case")]
    pub enum LoanKind {
        None,
        Newborn,
        Newlywed,
        Custom,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, Parser)]
    #[command(name = "afford-map")]
    #[command(about = "Shows which apartment deals a buyer can afford on a zoomable map")]
    pub struct CliConfig {
        #[arg(long, help = "Transaction CSV (overrides [data].path)")]
        pub data: Option<String>,

        #[arg(long, short = 'c', help = "TOML configuration file")]
        pub config: Option<String>,

        #[arg(long, default_value = "0", help = "Available cash in 억")]
        pub cash: f64,

        #[arg(long, value_enum, default_value = "none")]
        pub loan: LoanKind,

        #[arg(long, default_value = "0", help = "Annual household income in 억")]
        pub income: f64,

        #[arg(long, default_value = "360")]
        pub term_months: u32,

        #[arg(long, default_value = "4.0", help = "Annual interest rate in percent")]
        pub rate: f64,

        #[arg(long, default_value = "0", help = "Outstanding debt in 억, subtracted from the loan capacity")]
        pub debt: f64,

        #[arg(long, default_value = "15")]
        pub zoom: f64,

        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, help = "west,south,east,north")]
        pub bbox: Vec<f64>,

        #[arg(long)]
        pub area_min: Option<f64>,

        #[arg(long)]
        pub area_max: Option<f64>,

        #[arg(long)]
        pub year_min: Option<i32>,

        #[arg(long, help = "Write markers to this file instead of stdout")]
        pub output: Option<String>,

        #[arg(long, help = "Print a summary instead of marker descriptors")]
        pub summary: bool,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Emit logs as JSON")]
        pub log_json: bool,
    }

    impl CliConfig {
        pub fn view(&self) -> ViewState {
            let bbox = match <[f64; 4]>::try_from(self.bbox.as_slice()) {
                Ok(bbox) => bbox,
                Err(_) => DEFAULT_BBOX,
            };
            ViewState::new(self.zoom, BoundingBox::from_array(bbox))
        }

        pub fn filter(&self) -> RecordFilter {
            let area_range = match (self.area_min, self.area_max) {
                (None, None) => None,
                (min, max) => Some((min.unwrap_or(0.0), max.unwrap_or(f64::MAX))),
            };
            RecordFilter {
                area_range,
                year_min: self.year_min,
            }
        }

        /// 依選擇的貸款組成 BuyerState。政策貸款的所得門檻在這裡檢查。
        pub fn buyer(&self, config: &TomlConfig) -> Result<BuyerState> {
            let financing = match self.loan {
                LoanKind::None => FinancingConfig::None,
                LoanKind::Newborn | LoanKind::Newlywed => {
                    let id = match self.loan {
                        LoanKind::Newborn => "newborn",
                        _ => "newlywed",
                    };
                    let policy = config.policy_loan(id).ok_or_else(|| MapError::MissingConfigError {
                        field: format!("policy_loans.{}", id),
                    })?;
                    if !policy.is_eligible(self.income) {
                        return Err(MapError::invalid_input(
                            "income",
                            self.income,
                            &format!("exceeds the {} income ceiling of {}", policy.name, policy.max_income),
                        ));
                    }
                    FinancingConfig::Policy(policy.clone())
                }
                LoanKind::Custom => FinancingConfig::Custom(CustomLoan {
                    annual_income: self.income,
                    term_months: self.term_months,
                    annual_rate_percent: self.rate,
                    existing_debt: self.debt,
                }),
            };
            Ok(BuyerState::new(self.cash, financing))
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validate_non_negative("cash", self.cash)?;
            validate_non_negative("income", self.income)?;
            validate_non_negative("debt", self.debt)?;
            validate_finite("rate", self.rate)?;
            validate_finite("zoom", self.zoom)?;

            if self.loan == LoanKind::Custom {
                validate_positive("income", self.income)?;
                validate_positive("rate", self.rate)?;
                if self.term_months == 0 {
                    return Err(MapError::invalid_input(
                        "term_months",
                        self.term_months,
                        "loan term must be at least one month",
                    ));
                }
            }

            if !self.bbox.is_empty() {
                let bbox = <[f64; 4]>::try_from(self.bbox.as_slice()).map_err(|_| {
                    MapError::invalid_input("bbox", self.bbox.len(), "expected west,south,east,north")
                })?;
                if !BoundingBox::from_array(bbox).is_finite() {
                    return Err(MapError::invalid_input("bbox", format!("{:?}", bbox), "coordinates must be finite"));
                }
            }

            if let (Some(min), Some(max)) = (self.area_min, self.area_max) {
                if min > max {
                    return Err(MapError::invalid_input(
                        "area_min",
                        min,
                        "area_min must not exceed area_max",
                    ));
                }
            }

            if let Some(path) = &self.data {
                validate_path("data", path)?;
            }
            if let Some(path) = &self.config {
                validate_path("config", path)?;
            }
            if let Some(path) = &self.output {
                validate_path("output", path)?;
            }
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn parse(args: &[&str]) -> CliConfig {
            let mut argv = vec!["afford-map"];
            argv.extend_from_slice(args);
            CliConfig::parse_from(argv)
        }

        #[test]
        fn test_defaults() {
            let cli = parse(&[]);
            assert_eq!(cli.loan, LoanKind::None);
            assert_eq!(cli.term_months, 360);
            assert!(cli.validate().is_ok());
            assert_eq!(cli.view().bbox, BoundingBox::from_array(DEFAULT_BBOX));
            assert_eq!(cli.filter(), RecordFilter::default());
        }

        #[test]
        fn test_bbox_and_filter() {
            let cli = parse(&["--bbox", "126.8,37.5,126.9,37.55", "--area-min", "45", "--year-min", "2020"]);
            assert!(cli.validate().is_ok());
            assert_eq!(cli.view().bbox.east, 126.9);
            assert_eq!(cli.filter().area_range, Some((45.0, f64::MAX)));
            assert_eq!(cli.filter().year_min, Some(2020));
        }

        #[test]
        fn test_policy_eligibility() {
            let config = TomlConfig::default();

            let eligible = parse(&["--cash", "4", "--loan", "newborn", "--income", "1.0"]);
            let buyer = eligible.buyer(&config).unwrap();
            assert!(matches!(buyer.financing, FinancingConfig::Policy(ref p) if p.id == "newborn"));

            let too_rich = parse(&["--loan", "newlywed", "--income", "1.0"]);
            assert!(matches!(
                too_rich.buyer(&config).unwrap_err(),
                MapError::InvalidInput { .. }
            ));
        }

        #[test]
        fn test_custom_loan_requires_income() {
            let cli = parse(&["--loan", "custom"]);
            assert!(cli.validate().is_err());

            let cli = parse(&["--loan", "custom", "--income", "0.8", "--rate", "0"]);
            assert!(cli.validate().is_err());

            let cli = parse(&["--loan", "custom", "--income", "0.8", "--rate", "3.5"]);
            assert!(cli.validate().is_ok());
            let buyer = cli.buyer(&TomlConfig::default()).unwrap();
            match buyer.financing {
                FinancingConfig::Custom(loan) => {
                    assert_eq!(loan.annual_income, 0.8);
                    assert_eq!(loan.annual_rate_percent, 3.5);
                }
                other => panic!("unexpected financing: {:?}", other),
            }
        }

        #[test]
        fn test_negative_cash_rejected() {
            let cli = parse(&["--cash=-1"]);
            assert!(cli.validate().is_err());
        }
    }
}
