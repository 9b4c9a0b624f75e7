use std::path::Path;
use std::time::Duration;

use crate::compare::{ComparisonDimensions, ComparisonResult};

const RULE: &str = "----------------------------------";

pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

pub fn print_captured(path: &Path) {
    println!("Captured: {}", path.display());
}

pub fn print_dimensions(dimensions: &ComparisonDimensions) {
    for line in dimension_lines(dimensions) {
        println!("{line}");
    }
}

/// Report where the diff image went, or why there is none.
pub fn print_saved(path: Option<&Path>) {
    match path {
        Some(path) => println!("Saved: {}", path.display()),
        None => println!("Skipped: diff.png (nothing to compare)"),
    }
}

pub fn print_summary(result: &ComparisonResult) {
    for line in summary_lines(result) {
        println!("{line}");
    }
}

pub fn print_done() {
    println!("Done.");
}

fn dimension_lines(dimensions: &ComparisonDimensions) -> [String; 3] {
    [
        format!("Image 1: {}", dimensions.image1),
        format!("Image 2: {}", dimensions.image2),
        format!("Normalized: {}", dimensions.normalized),
    ]
}

fn summary_lines(result: &ComparisonResult) -> [String; 4] {
    [
        RULE.to_string(),
        format!("Mismatched pixels: {}", result.mismatched_pixels),
        format!("Mismatch: {:.2}%", result.mismatch_percentage),
        RULE.to_string(),
    ]
}
