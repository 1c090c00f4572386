use eyre::Report;
use nom::error::{VerboseError, VerboseErrorKind};

/// Renders a nom error trace as a chain of reports, innermost first, each tagged with the byte
/// offset into `source` where it happened.
pub fn format_error(error: VerboseError<&[u8]>, source: &[u8]) -> Report {
	let mut report: Option<Report> = None;
	for (remaining, kind) in error.errors {
		let location = source.len() - remaining.len();
		let string = match kind {
			VerboseErrorKind::Context(context) => format!("[{location}..] Context: {context}"),
			VerboseErrorKind::Char(char) => format!("[{location}..] Expected: {char:?}"),
			VerboseErrorKind::Nom(kind) => format!("[{location}..] Nom: {}", kind.description()),
		};

		report = Some(match report {
			Some(old_report) => old_report.wrap_err(string),
			None => Report::msg(string),
		});
	}

	report.unwrap_or_else(|| Report::msg("Unknown error"))
}
