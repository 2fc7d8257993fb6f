use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Target chemical name or structural string.
    #[arg(long = "material", value_name = "MATERIAL")]
    pub material: String,

    /// Number of documents to acquire in the initial retrieval stage.
    #[arg(long = "num_results", value_name = "N")]
    pub num_results: u32,

    /// Whether to run entity alignment (structural + synonym clustering).
    #[arg(long = "alignment", value_enum, default_value = "False")]
    pub alignment: BoolFlag,

    /// Whether to run the expansion controller on unexpandable intermediates.
    #[arg(long = "expansion", value_enum, default_value = "False")]
    pub expansion: BoolFlag,

    /// Whether to run the optional LLM-driven filtration stage.
    #[arg(long = "filtration", value_enum, default_value = "False")]
    pub filtration: BoolFlag,

    /// Document retrieval mode governing initial and expansion sources.
    #[arg(long = "retrieval_mode", value_enum, default_value = "patent-patent")]
    pub retrieval_mode: RetrievalMode,

    /// Optional path to write the JSON result to. Printed to stdout otherwise.
    #[arg(long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolFlag {
    #[value(name = "True")]
    True,
    #[value(name = "False")]
    False,
}

impl BoolFlag {
    pub fn as_bool(self) -> bool {
        matches!(self, BoolFlag::True)
    }
}

impl RetrievalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RetrievalMode::PatentPatent => "patent-patent",
            RetrievalMode::PaperPaper => "paper-paper",
            RetrievalMode::BothBoth => "both-both",
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    #[value(name = "patent-patent")]
    PatentPatent,
    #[value(name = "paper-paper")]
    PaperPaper,
    #[value(name = "both-both")]
    BothBoth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_minimal() {
        let args = vec!["retrosyn", "--material", "aspirin", "--num_results", "5"];
        let cli = Cli::parse_from(args);
        assert_eq!(cli.material, "aspirin");
        assert_eq!(cli.num_results, 5);
        assert_eq!(cli.alignment, BoolFlag::False);
        assert_eq!(cli.retrieval_mode, RetrievalMode::PatentPatent);
        assert!(cli.output.is_none());
    }

    #[test]
    fn test_cli_all_flags() {
        let args = vec![
            "retrosyn",
            "--material",
            "CC(=O)OC1=CC=CC=C1C(=O)O",
            "--num_results",
            "10",
            "--alignment",
            "True",
            "--expansion",
            "True",
            "--filtration",
            "True",
            "--retrieval_mode",
            "both-both",
            "--output",
            "out.json",
        ];
        let cli = Cli::parse_from(args);
        assert_eq!(cli.alignment, BoolFlag::True);
        assert_eq!(cli.expansion, BoolFlag::True);
        assert_eq!(cli.filtration, BoolFlag::True);
        assert_eq!(cli.retrieval_mode, RetrievalMode::BothBoth);
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_cli_missing_required() {
        let args = vec!["retrosyn", "--material", "aspirin"];
        let result = Cli::try_parse_from(args);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_invalid_retrieval_mode() {
        let args = vec![
            "retrosyn",
            "--material",
            "aspirin",
            "--num_results",
            "5",
            "--retrieval_mode",
            "bogus",
        ];
        let result = Cli::try_parse_from(args);
        assert!(result.is_err());
    }
}
