/// Constants used when classifying documents.
pub mod labeling {
    /// Tag that removes a document from every class.
    pub const DROP_TAG: &str = "drop";
    /// Substring marking the generic contrast family of negative tags.
    ///
    /// A tag from this family does not conflict with a positive tag.
    pub const GENERIC_CONTRAST_MARKER: &str = "random";
}

/// Constants used by reservation condition parsing.
pub mod reservation {
    use crate::types::Year;

    /// Lower bound of the trainable date window when none is configured.
    pub const DEFAULT_PAST_THRESHOLD: Year = 0;
    /// Upper bound of the trainable date window when none is configured.
    pub const DEFAULT_FUTURE_THRESHOLD: Year = 3000;
    /// Prefix of the token that caps the reservation size (for example `limit==250`).
    pub const LIMIT_PREFIX: &str = "limit==";
    /// Token that disables negative matching for reserved positives.
    pub const NO_MATCH_FLAG: &str = "donotmatch";
    /// Number of numeric tokens that form a date window.
    pub const DATE_WINDOW_TOKENS: usize = 2;
}

/// Constants used by proximity matching.
pub mod matching {
    /// Nationalities eligible for a mismatch penalty.
    pub const KNOWN_NATIONS: [&str; 2] = ["us", "uk"];
    /// Penalty added for a single demographic mismatch.
    ///
    /// Smaller than one year so date dominates either mismatch alone, larger
    /// than half a year so both mismatches together outweigh one year.
    pub const DEMOGRAPHIC_PENALTY: f64 = 0.6;
}

/// Constants used by metadata loading.
pub mod metadata {
    /// Separator between tags in the raw `genretags` column.
    pub const TAG_DELIMITER: char = '|';
    /// Placeholder some catalogs use for a missing author.
    pub const BLANK_AUTHOR: &str = "<blank>";
    /// Prefix for generated names of anonymous authors.
    pub const ANONYMOUS_AUTHOR_PREFIX: &str = "anonymous";
    /// Nationality aliases folded into a canonical code.
    pub const NATION_ALIASES: [(&str, &str); 2] = [("ca", "us"), ("ir", "uk")];
    /// Key in exclude-if rules that lists tags barred from the negative class.
    pub const NEGATIVE_EXCLUSION_KEY: &str = "negatives";

    /// Column holding the document identifier.
    pub const COLUMN_DOCID: &str = "docid";
    /// Column holding the publication date.
    pub const COLUMN_PUBDATE: &str = "date";
    /// Column holding the author's birth year.
    pub const COLUMN_BIRTHDATE: &str = "birthdate";
    /// Column holding the first publication date.
    pub const COLUMN_FIRSTPUB: &str = "firstpub";
    /// Column holding the author's gender.
    pub const COLUMN_GENDER: &str = "gender";
    /// Column holding the author's nationality.
    pub const COLUMN_NATION: &str = "nationality";
    /// Column holding the author name.
    pub const COLUMN_AUTHOR: &str = "author";
    /// Column holding the title.
    pub const COLUMN_TITLE: &str = "title";
    /// Column holding pipe-separated genre tags.
    pub const COLUMN_TAGS: &str = "genretags";
}

/// Constants used by the cohort builder and CLI.
pub mod builder {
    /// Seed used when the caller does not supply one.
    pub const DEFAULT_SEED: u64 = 42;
}
