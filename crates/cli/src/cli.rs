use clap::Parser;

/// Run a parameterized word-count query against the warehouse.
///
/// Submits the query with either positional (`?`) or named (`@corpus`,
/// `@min_word_count`) placeholders, waits for completion, and prints each
/// result row to stdout, one page at a time.
#[derive(Parser, Debug)]
#[command(name = "wharf", version, about)]
pub struct CliArgs {
    /// Corpus to search.
    pub corpus: String,

    /// Minimum word count to include.
    pub min_word_count: i64,

    /// Bind parameters by name (@corpus, @min_word_count).
    #[arg(long, conflicts_with = "use_positional_params")]
    pub use_named_params: bool,

    /// Bind parameters by position (?). This is the default.
    #[arg(long)]
    pub use_positional_params: bool,

    /// Execution mode: async (submit a job and poll) or sync (the service
    /// blocks until the result is ready).
    #[arg(long, default_value = "async")]
    pub mode: String,

    /// Fully qualified table to query.
    #[arg(long, env = "WHARF_TABLE", default_value = "samples.shakespeare")]
    pub table: String,

    /// Warehouse endpoint override (default: WHARF_ENDPOINT).
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Project override (default: WHARF_PROJECT).
    #[arg(long)]
    pub project: Option<String>,

    /// Rows per result page (default: WHARF_PAGE_SIZE).
    #[arg(long)]
    pub page_size: Option<u32>,
}
