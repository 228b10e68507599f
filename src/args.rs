use clap::Parser;

/// Turnout dashboard: loads precinct turnout data, filters it and summarizes it.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The CSV file with the precinct data. It must contain the columns precinct_id,
    /// total_registered_voters, votes_cast and geojson_boundary. Setting this option overrides the
    /// data source that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path, optional) A JSON configuration file with the data source, the initial filters,
    /// the insight settings and the output location.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (COLUMN=VALUE, repeatable) Only keep the precincts whose column has this value. The value
    /// 'All' or an empty value selects everything.
    #[clap(short, long, value_parser)]
    pub filter: Vec<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the dashboard will be written in JSON format to
    /// the given location. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing a summary in JSON format. If provided, turnoutvis will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// If passed as an argument, sends the data to the language model and reports its insights.
    /// The API key is read from the environment (GEMINI_API_KEY by default).
    #[clap(long, takes_value = false)]
    pub insights: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
