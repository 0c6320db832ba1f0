/// Parser for Cobertura XML coverage reports.
///
/// Cobertura XML structure:
///   <coverage>
///     <sources><source>...</source></sources>
///     <packages>
///       <package name="...">
///         <classes>
///           <class name="..." filename="..." line-rate="...">
///             <methods>
///               <method name="..." ... line-rate="...">
///                 <lines><line number="..." hits="..." /></lines>
///               </method>
///             </methods>
///             <lines>
///               <line number="..." hits="..." />
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::Result;
use crate::model::{CoverageData, FileCoverage, FunctionCoverage, LineCoverage};
use crate::parsers::CoverageParser;

pub struct CoberturaParser;

impl CoverageParser for CoberturaParser {
    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse_cobertura(input)
    }
}

fn parse_cobertura(input: &[u8]) -> Result<CoverageData> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut data = CoverageData::new();
    let mut buf = Vec::new();

    // State tracking
    let mut current_file: Option<FileCoverage> = None;
    let mut in_method = false;
    let mut current_method_name: Option<String> = None;
    let mut method_hit = false;
    let mut method_start_line: Option<u32> = None;
    let mut line_index_map: HashMap<u32, usize> = HashMap::new();

    // Source prefix from <source> elements
    let mut sources: Vec<String> = Vec::new();
    let mut in_source = false;

    loop {
        let event = reader.read_event_into(&mut buf);
        let is_start_event = matches!(&event, Ok(Event::Start(_)));
        match event {
            Err(e) => return Err(e.into()),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let local_name = e.name();
                let local = local_name.as_ref().to_vec();

                match local.as_slice() {
                    b"source" => {
                        // Only set in_source for Start events; self-closing
                        // <source/> has no text content and no End event, so
                        // setting the flag would capture the next unrelated
                        // Text event.
                        if is_start_event {
                            in_source = true;
                        }
                    }
                    b"class" => {
                        let attrs = attr_map(e);
                        if let Some(filename) = attrs.get("filename") {
                            let path = resolve_source_path(filename, &sources);
                            current_file = Some(FileCoverage::new(path));
                            line_index_map.clear();
                        }
                    }
                    b"method" => {
                        let attrs = attr_map(e);
                        in_method = true;
                        current_method_name = attrs.get("name").cloned();
                        method_hit = false;
                        method_start_line = None;
                    }
                    b"line" => {
                        let attrs = attr_map(e);
                        if let Some(file) = current_file.as_mut() {
                            if let Some(number_str) = attrs.get("number") {
                                if let Ok(line_number) = number_str.parse::<u32>() {
                                    let hit_count = attrs
                                        .get("hits")
                                        .and_then(|h| h.parse::<u64>().ok())
                                        .unwrap_or(0);

                                    // Lines may appear both under
                                    // <method><lines> and <class><lines>, or
                                    // only in one of them depending on the
                                    // generator. Deduplicate by keeping the
                                    // max hit_count for each line number.
                                    if let Some(&idx) = line_index_map.get(&line_number) {
                                        if hit_count > file.lines[idx].hit_count {
                                            file.lines[idx].hit_count = hit_count;
                                        }
                                    } else {
                                        line_index_map.insert(line_number, file.lines.len());
                                        file.lines.push(LineCoverage {
                                            line_number,
                                            hit_count,
                                        });
                                    }

                                    // Track method start line and hit status
                                    if in_method {
                                        if method_start_line.is_none() {
                                            method_start_line = Some(line_number);
                                        }
                                        if hit_count > 0 {
                                            method_hit = true;
                                        }
                                    }
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_source {
                    if let Ok(text) = e.unescape() {
                        sources.push(text.to_string());
                    }
                    in_source = false;
                }
            }
            Ok(Event::End(ref e)) => {
                let local_name = e.name();
                let local = local_name.as_ref().to_vec();
                match local.as_slice() {
                    b"source" => {
                        in_source = false;
                    }
                    b"class" => {
                        if let Some(file) = current_file.take() {
                            data.files.push(file);
                        }
                    }
                    b"method" => {
                        if in_method {
                            if let (Some(file), Some(name)) =
                                (current_file.as_mut(), current_method_name.take())
                            {
                                file.functions.push(FunctionCoverage {
                                    name,
                                    start_line: method_start_line,
                                    end_line: None,
                                    hit_count: if method_hit { 1 } else { 0 },
                                });
                            }
                            in_method = false;
                            method_start_line = None;
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        buf.clear();
    }

    // Handle unclosed file
    if let Some(file) = current_file.take() {
        data.files.push(file);
    }

    // Sort lines and functions within each file for consistent output, since
    // lines may have been collected from both <method> and <class> blocks.
    for file in &mut data.files {
        file.lines.sort_by_key(|l| l.line_number);
        file.functions
            .sort_by_key(|f| f.start_line.unwrap_or(u32::MAX));
    }

    Ok(data)
}

/// Resolve a filename against the list of `<source>` prefixes.
///
/// - If the filename is already absolute, return it as-is.
/// - Otherwise, prepend the first non-empty source prefix.
/// - If no non-empty sources exist, return the filename unchanged.
fn resolve_source_path(filename: &str, sources: &[String]) -> String {
    if filename.starts_with('/') {
        return filename.to_string();
    }
    for source in sources {
        let base = source.trim_end_matches('/');
        if !base.is_empty() {
            return format!("{}/{}", base, filename);
        }
    }
    filename.to_string()
}

/// Extract attributes from an XML element into a HashMap.
fn attr_map(e: &quick_xml::events::BytesStart) -> HashMap<String, String> {
    e.attributes()
        .flatten()
        .filter_map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).to_string();
            let value = a.unescape_value().ok()?.to_string();
            Some((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cobertura() {
        let input = include_bytes!("../../tests/fixtures/reports/sample_cobertura.xml");
        let data = parse_cobertura(input).unwrap();

        assert_eq!(data.files.len(), 1);
        let file = &data.files[0];
        assert_eq!(file.path, "src/calc.rb");

        assert_eq!(file.lines.len(), 6);
        assert_eq!(file.lines[0].line_number, 10);
        assert_eq!(file.lines[0].hit_count, 4);
        assert_eq!(file.lines[3].line_number, 14);
        assert_eq!(file.lines[3].hit_count, 0);

        assert_eq!(file.functions.len(), 2);
        assert_eq!(file.functions[0].name, "add");
        assert_eq!(file.functions[0].start_line, Some(10));
        assert_eq!(file.functions[0].hit_count, 1);
        assert_eq!(file.functions[1].name, "sub");
        assert_eq!(file.functions[1].start_line, Some(14));
        assert_eq!(file.functions[1].hit_count, 0);
    }

    #[test]
    fn test_parse_cobertura_source_prefix() {
        let input = br#"<?xml version="1.0"?>
<coverage>
  <sources><source>/project</source></sources>
  <packages><package name="p"><classes>
    <class name="Foo" filename="lib/foo.rb">
      <methods/>
      <lines><line number="1" hits="1"/></lines>
    </class>
  </classes></package></packages>
</coverage>"#;
        let data = parse_cobertura(input).unwrap();
        assert_eq!(data.files[0].path, "/project/lib/foo.rb");
    }

    #[test]
    fn test_parse_cobertura_dedups_method_and_class_lines() {
        // Line 5 appears under both <method> and <class> with different hit
        // counts; the max wins and the line appears once.
        let input = br#"<?xml version="1.0"?>
<coverage>
  <packages><package name="p"><classes>
    <class name="Foo" filename="foo.rb">
      <methods>
        <method name="bar">
          <lines><line number="5" hits="2"/></lines>
        </method>
      </methods>
      <lines><line number="5" hits="1"/></lines>
    </class>
  </classes></package></packages>
</coverage>"#;
        let data = parse_cobertura(input).unwrap();
        let file = &data.files[0];
        assert_eq!(file.lines.len(), 1);
        assert_eq!(file.lines[0].hit_count, 2);
    }

    #[test]
    fn test_parse_cobertura_invalid_xml() {
        // Mismatched end tag
        let input = b"<coverage><packages></nope></coverage>";
        assert!(parse_cobertura(input).is_err());
    }
}
