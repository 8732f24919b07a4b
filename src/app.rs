use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum, error::ErrorKind};
use serde::Serialize;

use crate::builder::CohortBuilder;
use crate::config::{ClassCriteria, CohortConfig, DateRange, MatchOrder, ReservationConditions};
use crate::constants::builder::DEFAULT_SEED;
use crate::data::{Cohort, DateField};
use crate::errors::CohortError;
use crate::metadata::{LoadReport, MetadataFilter, load_id_list, load_metadata};
use crate::rng::CohortRng;
use crate::summary::{CohortSummary, summarize};
use crate::types::Year;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateFieldArg {
    Pubdate,
    Birthdate,
    Firstpub,
}

impl From<DateFieldArg> for DateField {
    fn from(value: DateFieldArg) -> Self {
        match value {
            DateFieldArg::Pubdate => DateField::PubDate,
            DateFieldArg::Birthdate => DateField::BirthDate,
            DateFieldArg::Firstpub => DateField::FirstPub,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MatchOrderArg {
    Identifier,
    TrainableFirst,
}

impl From<MatchOrderArg> for MatchOrder {
    fn from(value: MatchOrderArg) -> Self {
        match value {
            MatchOrderArg::Identifier => MatchOrder::Identifier,
            MatchOrderArg::TrainableFirst => MatchOrder::TrainableFirst,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "select_cohort",
    disable_help_subcommand = true,
    about = "Select a matched training/evaluation cohort",
    long_about = "Classify tagged documents into positive and negative classes, reserve evaluation-only positives, cap class sizes, and pair positives with demographically matched negatives.",
    after_help = "Use --positive-tags/--negative-tags for tag mode or --positive-dates/--negative-dates for date mode."
)]
/// CLI for `select_cohort`.
///
/// Common usage:
/// - Tag mode: `--positive-tags sf_loc,sf_oclc --negative-tags random --sizecap 100`
/// - Date mode: `--positive-dates 1900,1920 --negative-dates 1850,1899 --date-field pubdate`
/// - Reserve juvenile fiction for evaluation only: `--reserve juv --reserve donotmatch`
struct SelectCohortCli {
    #[arg(long, value_name = "PATH", help = "JSON Lines metadata file")]
    metadata: PathBuf,
    #[arg(
        long,
        value_name = "PATH",
        help = "Restrict selection to the document ids listed in this file, one per line"
    )]
    ids: Option<PathBuf>,
    #[arg(
        long = "positive-tags",
        value_name = "TAG,...",
        value_delimiter = ',',
        help = "Tags defining the positive class (tag mode)"
    )]
    positive_tags: Vec<String>,
    #[arg(
        long = "negative-tags",
        value_name = "TAG,...",
        value_delimiter = ',',
        help = "Tags defining the negative class (tag mode)"
    )]
    negative_tags: Vec<String>,
    #[arg(
        long = "positive-dates",
        value_name = "MIN,MAX",
        value_parser = parse_date_range_arg,
        help = "Inclusive year range of the positive class (date mode)"
    )]
    positive_dates: Option<DateRange>,
    #[arg(
        long = "negative-dates",
        value_name = "MIN,MAX",
        value_parser = parse_date_range_arg,
        help = "Inclusive year range of the negative class (date mode)"
    )]
    negative_dates: Option<DateRange>,
    #[arg(
        long,
        default_value_t = 0,
        allow_negative_numbers = true,
        help = "Maximum trainable positives; 0 or less disables capping and matching"
    )]
    sizecap: i64,
    #[arg(
        long = "date-field",
        value_enum,
        default_value_t = DateFieldArg::Firstpub,
        help = "Date attribute used for date mode, reservation windows, and matching"
    )]
    date_field: DateFieldArg,
    #[arg(
        long = "exclude-negative",
        value_name = "TAG",
        help = "Tag that disqualifies an otherwise negative document, repeat as needed"
    )]
    exclude_negative: Vec<String>,
    #[arg(
        long = "reserve",
        value_name = "TOKEN",
        help = "Reservation condition: a tag, a year bound (give two), limit==N, or donotmatch"
    )]
    reserve: Vec<String>,
    #[arg(
        long = "strict-conditions",
        help = "Reject reservation conditions that hold a numeric token count other than 0 or 2"
    )]
    strict_conditions: bool,
    #[arg(
        long = "match-order",
        value_enum,
        default_value_t = MatchOrderArg::Identifier,
        help = "Order in which positives claim matched negatives"
    )]
    match_order: MatchOrderArg,
    #[arg(
        long = "allow-unmatched",
        help = "Leave positives unpaired instead of failing when negatives run out"
    )]
    allow_unmatched: bool,
    #[arg(
        long = "exclude-if",
        value_name = "COLUMN=VALUE",
        value_parser = parse_column_value_arg,
        help = "Drop metadata rows whose column equals the value (negatives=a|b lists negative exclusions)"
    )]
    exclude_if: Vec<(String, String)>,
    #[arg(
        long = "exclude-if-not",
        value_name = "COLUMN=VALUE",
        value_parser = parse_column_value_arg,
        help = "Drop metadata rows whose column differs from the value"
    )]
    exclude_if_not: Vec<(String, String)>,
    #[arg(
        long = "exclude-below",
        value_name = "COLUMN=YEAR",
        value_parser = parse_column_year_arg,
        help = "Drop metadata rows whose year column is below the bound"
    )]
    exclude_below: Vec<(String, Year)>,
    #[arg(
        long = "exclude-above",
        value_name = "COLUMN=YEAR",
        value_parser = parse_column_year_arg,
        help = "Drop metadata rows whose year column is above the bound"
    )]
    exclude_above: Vec<(String, Year)>,
    #[arg(long, default_value_t = DEFAULT_SEED, help = "Deterministic seed for all sampling")]
    seed: u64,
    #[arg(long, value_name = "PATH", help = "Write the JSON report here instead of stdout")]
    output: Option<PathBuf>,
}

/// JSON document written by `select_cohort`.
#[derive(Debug, Serialize)]
pub struct SelectionReport {
    /// Seed that drove every random decision.
    pub seed: u64,
    /// Row counts from metadata loading.
    pub load: LoadReport,
    /// Balance metrics for the selected cohort.
    pub summary: CohortSummary,
    /// The selected cohort.
    pub cohort: Cohort,
}

/// Run the `select_cohort` CLI with the given arguments (program name excluded).
pub fn run_select_cohort<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();

    let args = std::iter::once("select_cohort".to_string()).chain(args_iter);
    let Some(cli) = parse_cli::<SelectCohortCli, _>(args)? else {
        return Ok(());
    };

    let filter = metadata_filter(&cli);
    let config = cohort_config(&cli, &filter)?;
    let builder = CohortBuilder::new(config)?;
    let ids = cli.ids.as_ref().map(load_id_list).transpose()?;
    let loaded = load_metadata(&cli.metadata, &filter, ids.as_deref())?;

    let mut rng = CohortRng::new(cli.seed);
    let cohort = builder.build(&loaded.records, &mut rng)?;
    let summary = summarize(&cohort, &loaded.records, builder.config().date_field)?;
    let report = SelectionReport {
        seed: cli.seed,
        load: loaded.report,
        summary,
        cohort,
    };

    match &cli.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, &report)?;
            writer.flush()?;
            eprintln!(
                "Wrote {} positives and {} negatives to {}",
                report.summary.positives,
                report.summary.negatives,
                path.display()
            );
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, &report)?;
            writeln!(handle)?;
        }
    }
    Ok(())
}

fn metadata_filter(cli: &SelectCohortCli) -> MetadataFilter {
    let mut filter = MetadataFilter::default();
    for (column, value) in &cli.exclude_if {
        filter = filter.with_exclude_if(column.clone(), value.clone());
    }
    for (column, value) in &cli.exclude_if_not {
        filter = filter.with_exclude_if_not(column.clone(), value.clone());
    }
    for (column, year) in &cli.exclude_below {
        filter = filter.with_exclude_below(column.clone(), *year);
    }
    for (column, year) in &cli.exclude_above {
        filter = filter.with_exclude_above(column.clone(), *year);
    }
    filter
}

fn cohort_config(
    cli: &SelectCohortCli,
    filter: &MetadataFilter,
) -> Result<CohortConfig, CohortError> {
    let has_tags = !cli.positive_tags.is_empty() || !cli.negative_tags.is_empty();
    let criteria = match (has_tags, cli.positive_dates, cli.negative_dates) {
        (true, None, None) => ClassCriteria::tags(&cli.positive_tags, &cli.negative_tags),
        (false, Some(positive), Some(negative)) => ClassCriteria::dates(positive, negative),
        (true, _, _) => {
            return Err(CohortError::Configuration(
                "tag criteria and date criteria cannot be combined".into(),
            ));
        }
        _ => {
            return Err(CohortError::Configuration(
                "give --positive-tags/--negative-tags or both --positive-dates and --negative-dates"
                    .into(),
            ));
        }
    };

    let reservation = if cli.strict_conditions {
        ReservationConditions::parse_strict(&cli.reserve)?
    } else {
        ReservationConditions::parse(&cli.reserve)?
    };

    Ok(CohortConfig::new(criteria)
        .with_sizecap(cli.sizecap)
        .with_date_field(cli.date_field.into())
        .with_negative_exclusions(&cli.exclude_negative)
        .with_negative_exclusions(filter.negative_exclusion_tags())
        .with_reservation(reservation)
        .with_match_order(cli.match_order.into())
        .with_allow_unmatched(cli.allow_unmatched))
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

fn parse_date_range_arg(raw: &str) -> Result<DateRange, String> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 2 {
        return Err("date ranges expect exactly 2 comma-separated years (MIN,MAX)".to_string());
    }
    let min = parts[0]
        .trim()
        .parse::<Year>()
        .map_err(|_| format!("invalid minimum year '{}'", parts[0].trim()))?;
    let max = parts[1]
        .trim()
        .parse::<Year>()
        .map_err(|_| format!("invalid maximum year '{}'", parts[1].trim()))?;
    if min > max {
        return Err(format!("date range {min},{max} is reversed"));
    }
    Ok(DateRange::new(min, max))
}

fn parse_column_value_arg(raw: &str) -> Result<(String, String), String> {
    let (column, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=VALUE, got '{raw}'"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("missing column name in '{raw}'"));
    }
    Ok((column.to_string(), value.to_string()))
}

fn parse_column_year_arg(raw: &str) -> Result<(String, Year), String> {
    let (column, value) = parse_column_value_arg(raw)?;
    let year = value
        .trim()
        .parse::<Year>()
        .map_err(|_| format!("invalid year '{}' for column '{column}'", value.trim()))?;
    Ok((column, year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cli(args: &[&str]) -> SelectCohortCli {
        SelectCohortCli::try_parse_from(
            std::iter::once("select_cohort").chain(args.iter().copied()),
        )
        .unwrap()
    }

    #[test]
    fn date_range_arg_requires_two_ordered_years() {
        assert_eq!(parse_date_range_arg("1900, 1920"), Ok(DateRange::new(1900, 1920)));
        assert!(parse_date_range_arg("1900").is_err());
        assert!(parse_date_range_arg("1920,1900").is_err());
        assert!(parse_date_range_arg("1900,later").is_err());
    }

    #[test]
    fn column_args_split_on_first_equals() {
        assert_eq!(
            parse_column_value_arg("negatives=juv|poetry"),
            Ok(("negatives".to_string(), "juv|poetry".to_string()))
        );
        assert!(parse_column_value_arg("=x").is_err());
        assert_eq!(parse_column_year_arg("date=1900"), Ok(("date".to_string(), 1900)));
        assert!(parse_column_year_arg("date=soon").is_err());
    }

    #[test]
    fn cli_builds_tag_config() {
        let parsed = cli(&[
            "--metadata",
            "meta.jsonl",
            "--positive-tags",
            "sf_loc,sf_oclc",
            "--negative-tags",
            "random",
            "--sizecap",
            "50",
            "--reserve",
            "juv",
            "--reserve",
            "donotmatch",
            "--exclude-if",
            "negatives=poetry",
            "--match-order",
            "trainable-first",
        ]);
        let filter = metadata_filter(&parsed);
        let config = cohort_config(&parsed, &filter).unwrap();
        assert_eq!(config.cap(), Some(50));
        assert_eq!(config.date_field, DateField::FirstPub);
        assert!(config.reservation.no_match());
        assert!(config.negative_exclusion_tags.contains("poetry"));
        assert_eq!(config.match_order, MatchOrder::TrainableFirst);
    }

    #[test]
    fn cli_rejects_missing_or_mixed_criteria() {
        let none = cli(&["--metadata", "meta.jsonl"]);
        assert!(cohort_config(&none, &MetadataFilter::default()).is_err());

        let mixed = cli(&[
            "--metadata",
            "meta.jsonl",
            "--positive-tags",
            "sf_loc",
            "--positive-dates",
            "1900,1920",
        ]);
        assert!(cohort_config(&mixed, &MetadataFilter::default()).is_err());

        let strict = cli(&[
            "--metadata",
            "meta.jsonl",
            "--positive-tags",
            "sf_loc",
            "--reserve",
            "1900",
            "--strict-conditions",
        ]);
        assert!(cohort_config(&strict, &MetadataFilter::default()).is_err());
    }

    #[test]
    fn run_writes_json_report() {
        let temp = tempdir().unwrap();
        let metadata = temp.path().join("meta.jsonl");
        let rows = [
            r#"{"docid": "p1", "firstpub": "1950", "gender": "f", "nationality": "us", "genretags": "sf_loc"}"#,
            r#"{"docid": "p2", "firstpub": "1955", "gender": "m", "nationality": "uk", "genretags": "sf_loc"}"#,
            r#"{"docid": "n1", "firstpub": "1951", "gender": "f", "nationality": "us", "genretags": "random"}"#,
            r#"{"docid": "n2", "firstpub": "1955", "gender": "m", "nationality": "uk", "genretags": "random"}"#,
            r#"{"docid": "n3", "firstpub": "1990", "gender": "m", "nationality": "uk", "genretags": "random"}"#,
        ];
        std::fs::write(&metadata, rows.join("\n")).unwrap();
        let output = temp.path().join("cohort.json");

        let args = [
            "--metadata",
            metadata.to_str().unwrap(),
            "--positive-tags",
            "sf_loc",
            "--negative-tags",
            "random",
            "--sizecap",
            "2",
            "--seed",
            "7",
            "--output",
            output.to_str().unwrap(),
        ];
        run_select_cohort(args.iter().map(|arg| arg.to_string())).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["seed"], 7);
        assert_eq!(written["summary"]["positives"], 2);
        assert_eq!(written["summary"]["negatives"], 2);
        assert_eq!(written["cohort"]["classes"]["n1"], 0);
        assert_eq!(written["cohort"]["classes"]["n2"], 0);
        assert!(written["cohort"]["classes"].get("n3").is_none());
    }

    #[test]
    fn id_list_flag_restricts_metadata() {
        let temp = tempdir().unwrap();
        let metadata = temp.path().join("meta.jsonl");
        let rows = [
            r#"{"docid": "p1", "firstpub": "1950", "genretags": "sf_loc"}"#,
            r#"{"docid": "p2", "firstpub": "1952", "genretags": "sf_loc"}"#,
            r#"{"docid": "n1", "firstpub": "1951", "genretags": "random"}"#,
        ];
        std::fs::write(&metadata, rows.join("\n")).unwrap();
        let ids = temp.path().join("ids.txt");
        std::fs::write(&ids, "p1\nn1\nmissing\n").unwrap();
        let output = temp.path().join("cohort.json");

        let args = [
            "--metadata",
            metadata.to_str().unwrap(),
            "--ids",
            ids.to_str().unwrap(),
            "--positive-tags",
            "sf_loc",
            "--negative-tags",
            "random",
            "--output",
            output.to_str().unwrap(),
        ];
        run_select_cohort(args.iter().map(|arg| arg.to_string())).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["load"]["missing_in_metadata"], 1);
        assert_eq!(written["load"]["missing_in_ids"], 1);
        assert_eq!(written["load"]["accepted"], 2);
        assert!(written["cohort"]["classes"].get("p2").is_none());
    }
}
