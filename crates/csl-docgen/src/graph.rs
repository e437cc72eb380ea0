//! Structure-graph payload serialized into page markup.
//!
//! The JSON lands in a `data-structure-graph` attribute; `site.js` lays
//! the nodes out client-side by depth level.

/// One node of a structure graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Stable id derived from the table path.
    pub id: String,
    /// Human readable label (display segment or schema name).
    pub label: String,
    /// Target page file, empty when the node has no page.
    pub file: String,
    /// 0 = root / center.
    pub depth: usize,
}

/// One parent→child edge.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub label: String,
}

/// Escape a string for embedding in a JSON string literal.
pub fn json_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// Serialize the graph payload.
pub fn build_structure_graph_json(
    schema_name: &str,
    nodes: &[GraphNode],
    edges: &[GraphEdge],
) -> String {
    let mut json = String::new();
    json.push('{');
    json.push_str(&format!("\"schema\":\"{}\",", json_escape(schema_name)));
    json.push_str("\"nodes\":[");
    for (i, n) in nodes.iter().enumerate() {
        if i > 0 {
            json.push(',');
        }
        json.push_str(&format!(
            "{{\"id\":\"{}\",\"label\":\"{}\",\"file\":\"{}\",\"depth\":{}}}",
            json_escape(&n.id),
            json_escape(&n.label),
            json_escape(&n.file),
            n.depth
        ));
    }
    json.push_str("],\"edges\":[");
    for (i, e) in edges.iter().enumerate() {
        if i > 0 {
            json.push(',');
        }
        json.push_str(&format!(
            "{{\"from\":\"{}\",\"to\":\"{}\",\"key\":\"{}\"}}",
            json_escape(&e.from),
            json_escape(&e.to),
            json_escape(&e.label)
        ));
    }
    json.push_str("]}");
    json
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_escape() {
        assert_eq!(json_escape("a\"b\\c"), "a\\\"b\\\\c");
        assert_eq!(json_escape("x\u{1f}y"), "x\\u001fy");
    }

    #[test]
    fn test_graph_payload_shape() {
        let nodes = vec![GraphNode {
            id: String::new(),
            label: "App".into(),
            file: "app.html".into(),
            depth: 0,
        }];
        let edges = vec![GraphEdge {
            from: String::new(),
            to: "db".into(),
            label: "db".into(),
        }];
        let json = build_structure_graph_json("App", &nodes, &edges);
        assert!(json.starts_with("{\"schema\":\"App\","));
        assert!(json.contains("\"nodes\":[{\"id\":\"\",\"label\":\"App\""));
        assert!(json.contains("\"edges\":[{\"from\":\"\",\"to\":\"db\",\"key\":\"db\"}]"));
    }
}
