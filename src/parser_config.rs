/// Parser options for controlling error handling and recovery behavior.
///
/// These options trade strict container validation for broader compatibility
/// with bundles produced by sloppy encoders.
///
/// # Example
///
/// ```
/// use djvu_oxide::parser_config::ParserOptions;
///
/// // Strict mode - fail on the first structural anomaly
/// let strict = ParserOptions::strict();
///
/// // Lenient mode - log anomalies and keep going (default)
/// let lenient = ParserOptions::lenient();
///
/// // Custom configuration
/// let custom = ParserOptions {
///     strict: false,
///     max_decompressed_size: 16 * 1024 * 1024,
///     max_file_size: 0,
/// };
/// # let _ = (strict, lenient, custom);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Fail on structural anomalies (true) or log and skip them (false)
    ///
    /// Affects components that are not FORM chunks, directory sizes that
    /// disagree with chunk headers, and shared resources without an id.
    pub strict: bool,

    /// Maximum size of a single decompressed BZZ stream in bytes
    ///
    /// Default: 64 MB. Set to 0 to disable check.
    pub max_decompressed_size: usize,

    /// Maximum input buffer size in bytes
    ///
    /// Default: 1 GB. Set to 0 to disable check.
    pub max_file_size: usize,
}

impl Default for ParserOptions {
    /// Default configuration: lenient mode with size limits
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParserOptions {
    /// Strict mode: fail on any structural anomaly
    pub fn strict() -> Self {
        Self {
            strict: true,
            max_decompressed_size: 64 * 1024 * 1024, // 64 MB
            max_file_size: 1024 * 1024 * 1024,       // 1 GB
        }
    }

    /// Lenient mode: log anomalies and continue
    pub fn lenient() -> Self {
        Self {
            strict: false,
            max_decompressed_size: 64 * 1024 * 1024, // 64 MB
            max_file_size: 1024 * 1024 * 1024,       // 1 GB
        }
    }

    /// Very lenient mode: no size limits at all
    ///
    /// Warning: a hostile directory can then expand without bound.
    pub fn very_lenient() -> Self {
        Self {
            strict: false,
            max_decompressed_size: 0,
            max_file_size: 0,
        }
    }

    /// Report a tolerated anomaly.
    ///
    /// Logs a warning and returns `Ok(())` in lenient mode; in strict mode
    /// the error built by `make_error` is returned instead.
    pub(crate) fn tolerate<F>(&self, message: &str, make_error: F) -> crate::error::Result<()>
    where
        F: FnOnce(String) -> crate::error::Error,
    {
        if self.strict {
            return Err(make_error(message.to_string()));
        }
        log::warn!("{}", message);
        Ok(())
    }
}
