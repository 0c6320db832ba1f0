/// Parser for the LCOV `.info` format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Key records:
///   TN:<test name>
///   SF:<path to source file>
///   FN:<line>,<function name>
///   FNDA:<execution count>,<function name>
///   DA:<line number>,<execution count>[,<checksum>]
///   LF:<lines found>
///   LH:<lines hit>
///   end_of_record
use std::collections::HashMap;
use std::io::BufRead;

use crate::error::{PatchcovError, Result};
use crate::model::{CoverageData, FileCoverage, FunctionCoverage, LineCoverage};
use crate::parsers::CoverageParser;

/// LCOV format parser.
pub struct LcovParser;

impl CoverageParser for LcovParser {
    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse(input)
    }
}

/// Parse LCOV format coverage data from raw bytes.
pub fn parse(input: &[u8]) -> Result<CoverageData> {
    let mut reader: &[u8] = input;
    let mut data = CoverageData::new();

    let mut current_file: Option<FileCoverage> = None;

    // Function definitions for the current record, in declaration order,
    // with hit counts filled in from FNDA as they arrive.
    let mut fn_defs: Vec<(String, u32)> = Vec::new();
    let mut fn_hits: HashMap<String, u64> = HashMap::new();

    let mut raw_line = String::new();
    loop {
        raw_line.clear();
        let n = reader
            .read_line(&mut raw_line)
            .map_err(|_| PatchcovError::Parse("Invalid UTF-8 in LCOV data".to_string()))?;
        if n == 0 {
            break; // EOF
        }

        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "end_of_record" {
            finish_record(current_file.take(), &mut fn_defs, &mut fn_hits, &mut data);
            continue;
        }

        // Split on first ':'
        let (tag, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue, // Skip lines we don't understand
        };

        match tag {
            "TN" => {
                // Test name — ignored.
            }
            "SF" => {
                // A new SF without an end_of_record closes the previous file.
                finish_record(current_file.take(), &mut fn_defs, &mut fn_hits, &mut data);
                current_file = Some(FileCoverage::new(value.to_string()));
            }
            "FN" => {
                // FN:<line>,<function_name>
                if let Some((line_str, name)) = value.split_once(',') {
                    if let Ok(start_line) = line_str.parse::<u32>() {
                        fn_defs.push((name.to_string(), start_line));
                    }
                }
            }
            "FNDA" => {
                // FNDA:<execution_count>,<function_name>
                if let Some((count_str, name)) = value.split_once(',') {
                    let hit_count = count_str.parse::<u64>().unwrap_or(0);
                    fn_hits.insert(name.to_string(), hit_count);
                }
            }
            "DA" => {
                // DA:<line_number>,<execution_count>[,<checksum>]
                // Some instrumenters use negative counts (e.g., -1) to mark
                // non-instrumentable lines. We skip those entirely.
                if let Some(file) = current_file.as_mut() {
                    let parts: Vec<&str> = value.splitn(3, ',').collect();
                    if parts.len() >= 2 {
                        if let Ok(line_number) = parts[0].parse::<u32>() {
                            match parts[1].parse::<i64>() {
                                Ok(count) if count >= 0 => {
                                    file.lines.push(LineCoverage {
                                        line_number,
                                        hit_count: count as u64,
                                    });
                                }
                                _ => {
                                    // Negative count or parse failure — skip.
                                }
                            }
                        }
                    }
                }
            }
            // LF, LH, FNF, FNH — summary lines; we derive these from the data.
            _ => {}
        }
    }

    // Handle case where file ends without end_of_record
    finish_record(current_file.take(), &mut fn_defs, &mut fn_hits, &mut data);

    Ok(data)
}

/// Close out the current `SF:` record: attach accumulated function
/// definitions (FNDA hits default to 0) and push the file.
fn finish_record(
    file: Option<FileCoverage>,
    fn_defs: &mut Vec<(String, u32)>,
    fn_hits: &mut HashMap<String, u64>,
    data: &mut CoverageData,
) {
    if let Some(mut file) = file {
        for (name, start_line) in fn_defs.drain(..) {
            let hit_count = fn_hits.get(&name).copied().unwrap_or(0);
            file.functions.push(FunctionCoverage {
                name,
                start_line: Some(start_line),
                end_line: None,
                hit_count,
            });
        }
        file.functions
            .sort_by_key(|f| f.start_line.unwrap_or(u32::MAX));
        data.files.push(file);
    }
    fn_defs.clear();
    fn_hits.clear();
}
