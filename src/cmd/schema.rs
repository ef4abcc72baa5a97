//! Schema command - print expected input formats

use crate::core::input::InputFile;
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format: json-schema or line-format
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the .json input format
    JsonSchema,
    /// Description of the whitespace separated line format
    LineFormat,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => println!("{}", json_schema()?),
            SchemaFormat::LineFormat => print_line_format(),
        }
        Ok(())
    }
}

fn json_schema() -> serde_json::Result<String> {
    let schema = schema_for!(InputFile);
    serde_json::to_string_pretty(&schema)
}

fn print_line_format() {
    println!("Line Input Format");
    println!("=================");
    println!();
    for (keyword, fields, description) in LINE_RECORDS {
        println!("{:10} {:40}  {}", keyword, fields, description);
    }
    println!();
    println!("Dates are dd/mm/yyyy. Blank lines and lines starting with # are ignored.");
}

const LINE_RECORDS: &[(&str, &str, &str)] = &[
    ("BUY", "<date> <asset> <amount> <price> <expenses>", "Acquisition"),
    ("SELL", "<date> <asset> <amount> <price> <expenses>", "Disposal"),
    ("GIFT", "<date> <asset> <amount>", "Disposal at no gain or loss"),
    ("CAPRETURN", "<date> <asset> <amount> <value>", "Capital returned on a holding"),
    ("DIVIDEND", "<date> <asset> <amount> <value>", "Accumulation fund dividend"),
    ("SPLIT", "<date> <asset> <multiplier>", "Each share becomes <multiplier> shares"),
    ("UNSPLIT", "<date> <asset> <multiplier>", "Every <multiplier> shares become one"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_schema_describes_input_file() {
        let schema: serde_json::Value = serde_json::from_str(&json_schema().unwrap()).unwrap();
        let properties = &schema["properties"];
        assert!(properties.get("transactions").is_some());
        assert!(properties.get("asset_events").is_some());
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|r| r == "transactions"));
        assert!(!required.iter().any(|r| r == "asset_events"));
    }
}
