use serde_json::Value;
use std::io::{self, Write};

use crate::error::StreamError;
use crate::stream::{ProgressUpdate, Step, StreamHandler, SummaryKind};

/// Writes session progress to a terminal (or any writer).
///
/// Step markers become status lines, structured steps get a one-line
/// summary, and analysis text is echoed as it arrives.
pub struct TerminalRenderer<W: Write> {
    out: W,
    streamed_text: bool,
    io_error: Option<io::Error>,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            streamed_text: false,
            io_error: None,
        }
    }

    /// First write failure, if any
    pub fn io_error(&self) -> Option<&io::Error> {
        self.io_error.as_ref()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if self.io_error.is_some() {
            return;
        }
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            self.io_error = Some(e);
        }
    }

    fn end_text_block(&mut self) {
        if self.streamed_text {
            self.write("\n");
            self.streamed_text = false;
        }
    }
}

fn num(data: &Value, pointer: &str) -> f64 {
    data.pointer(pointer).and_then(Value::as_f64).unwrap_or_default()
}

fn text<'a>(data: &'a Value, pointer: &str) -> &'a str {
    data.pointer(pointer).and_then(Value::as_str).unwrap_or("Unknown")
}

/// One-line rendering of a structured step payload
pub fn summarize(kind: SummaryKind, data: &Value) -> String {
    match kind {
        SummaryKind::Location => format!(
            "Location: {} (population {:.0})",
            text(data, "/name"),
            num(data, "/population")
        ),
        SummaryKind::Energy => format!(
            "Energy: ${:.3}/kWh ({})",
            num(data, "/price_per_kwh"),
            text(data, "/state")
        ),
        SummaryKind::Climate => format!(
            "Climate: {:.0}°F, {:.0}% humidity, {}",
            num(data, "/temperature_f"),
            num(data, "/humidity"),
            text(data, "/description")
        ),
        SummaryKind::Impact => format!(
            "Impact: {:.0} MWh/yr, {:.0} t CO2/yr, {:.0} gal water/yr",
            num(data, "/energy/annual_mwh"),
            num(data, "/carbon/annual_tons_co2"),
            num(data, "/water/annual_gallons")
        ),
    }
}

impl<W: Write> StreamHandler for TerminalRenderer<W> {
    fn on_update(&mut self, update: &ProgressUpdate) {
        let Some(step) = &update.step else {
            return;
        };
        self.end_text_block();

        let mut line = format!("» {}\n", step.status_text());
        if let (Some(kind), Some(data)) = (step.summary_kind(), &update.data) {
            line.push_str(&format!("  {}\n", summarize(kind, data)));
        }
        self.write(&line);
    }

    fn on_chunk(&mut self, delta: &str, _accumulated: &str) {
        self.streamed_text = true;
        self.write(delta);
    }

    fn on_complete(&mut self, report: &Value) {
        self.end_text_block();
        if let Some(final_size) = report.get("final_size_mw").and_then(Value::as_f64) {
            self.write(&format!(
                "Projected size: {:.1} MW, cumulative emissions {:.0} t CO2\n",
                final_size,
                num(report, "/total_carbon_tons")
            ));
        }
        self.write("✓ Complete\n");
    }

    fn on_error(&mut self, error: &StreamError) {
        self.end_text_block();
        self.write(&format!("✗ Error: {}\n", error));
    }

    fn on_closed(&mut self, last_step: &Step) {
        self.end_text_block();
        self.write(&format!(
            "⚠ Stream closed before completion (last step: {})\n",
            last_step
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamSession;

    fn render(frames: &str) -> String {
        let mut renderer = TerminalRenderer::new(Vec::new());
        let mut session = StreamSession::new();
        session.feed(frames.as_bytes(), &mut renderer);
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn test_renders_steps_text_and_completion() {
        let output = render(concat!(
            "data: {\"step\":\"initializing\"}\n\n",
            "data: {\"step\":\"fetching_location_data\",\"data\":{\"name\":\"Springfield\",\"population\":100000}}\n\n",
            "data: {\"status\":\"analysis_chunk\",\"text\":\"Hello, \"}\n\n",
            "data: {\"status\":\"analysis_chunk\",\"text\":\"world!\"}\n\n",
            "data: {\"status\":\"complete\",\"report\":{}}\n\n",
        ));

        assert_eq!(
            output,
            "» Initializing analysis...\n\
             » Fetching location and population data...\n  Location: Springfield (population 100000)\n\
             Hello, world!\n\
             ✓ Complete\n"
        );
    }

    #[test]
    fn test_unknown_step_renders_literal_name() {
        let output = render("data: {\"step\":\"warming_up\"}\n\n");
        assert_eq!(output, "» warming_up\n");
    }

    #[test]
    fn test_renders_error() {
        let output = render("data: {\"status\":\"error\",\"message\":\"boom\"}\n\n");
        assert_eq!(output, "✗ Error: boom\n");
    }

    #[test]
    fn test_closed_stream_notice_ends_text_block() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        let mut session = StreamSession::new();
        session.feed(
            concat!(
                "data: {\"step\":\"generating_analysis\"}\n\n",
                "data: {\"status\":\"analysis_chunk\",\"text\":\"Partial\"}\n\n",
            )
            .as_bytes(),
            &mut renderer,
        );
        renderer.on_closed(session.last_step());

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.ends_with(
            "Partial\n⚠ Stream closed before completion (last step: generating_analysis)\n"
        ));
    }

    #[test]
    fn test_summaries() {
        let data = serde_json::json!({"price_per_kwh": 0.11, "state": "TX"});
        assert_eq!(summarize(SummaryKind::Energy, &data), "Energy: $0.110/kWh (TX)");
    }
}
