//! # Platen CLI
//!
//! Usage:
//!   platen template.json -o plan.json
//!   platen template.json -d data.json
//!   echo '{ ... }' | platen -o plan.json
//!   platen --example > label.json

use std::env;
use std::fs;
use std::io::{self, Read};

use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    // Handle --example flag
    if args.iter().any(|a| a == "--example") {
        print!("{}", example_label_json());
        return;
    }

    // Read template input
    let input = if args.len() > 1 && !args[1].starts_with('-') {
        fs::read_to_string(&args[1]).expect("Failed to read template file")
    } else {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .expect("Failed to read stdin");
        buf
    };

    // Optional data snapshot
    let data = args
        .windows(2)
        .find(|w| w[0] == "-d")
        .map(|w| fs::read_to_string(&w[1]).expect("Failed to read data file"));

    // Output path (stdout when absent)
    let output_path = args.windows(2).find(|w| w[0] == "-o").map(|w| w[1].clone());

    match platen::paginate_json(&input, data.as_deref()) {
        Ok(plan) => match output_path {
            Some(path) => {
                fs::write(&path, &plan).expect("Failed to write page plan");
                eprintln!("✓ Written {} bytes to {}", plan.len(), path);
            }
            None => println!("{plan}"),
        },
        Err(e) => {
            eprintln!("✗ {e}");
            std::process::exit(1);
        }
    }
}

fn example_label_json() -> &'static str {
    r##"{
  "paper": {
    "width": 100,
    "height": 150,
    "margin": { "top": 5, "right": 5, "bottom": 5, "left": 5 },
    "headerText": "ACME LOGISTICS",
    "footerText": "Thank you for shipping with us"
  },
  "widgets": [
    {
      "id": "recipient",
      "kind": { "type": "text", "content": "", "binding": "recipient" },
      "x": 5, "y": 5, "width": 60, "height": 10
    },
    {
      "id": "tracking-code",
      "kind": { "type": "barcode", "value": "", "binding": "tracking" },
      "x": 5, "y": 18, "width": 80, "height": 18
    },
    {
      "id": "divider",
      "kind": { "type": "line" },
      "x": 5, "y": 40, "width": 90, "height": 0.5
    },
    {
      "id": "items",
      "kind": {
        "type": "table",
        "mode": "complex",
        "rows": 2,
        "cols": 3,
        "headerRows": 1,
        "cells": [
          [
            { "content": "Item" },
            { "content": "Qty" },
            { "content": "Weight" }
          ],
          [
            { "content": "" },
            { "content": "" },
            { "content": "" }
          ]
        ],
        "columnWidths": [0.5, 0.2, 0.3],
        "rowHeights": [0.5, 0.5],
        "columnBindings": { "0": "item", "1": "qty", "2": "weight" }
      },
      "x": 5, "y": 44, "width": 90, "height": 16
    }
  ],
  "batch": {
    "enabled": true,
    "dataSourceFile": "shipments.xlsx",
    "printRange": "range",
    "rangeStart": 0,
    "rangeEnd": 9
  }
}
"##
}
