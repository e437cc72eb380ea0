//! HTML documentation generator for CSL schemas.
//!
//! Walks every schema, creates one page per schema root and one per
//! nested table (reachable through explicit keys or the wildcard), and
//! returns the whole site as a path → content map. Static assets are
//! constant strings; structure graphs are laid out client-side from a
//! JSON payload embedded in the markup.

mod assets;
mod graph;
mod paths;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write;

use csl_format::{expr_to_string, quote_identifier, schema_to_csl};
use csl_repr::{Annotation, Ast, ConfigSchema, Constraint, CslType, Expr, ExprId, TableType, TypeId};
use graph::{build_structure_graph_json, GraphEdge, GraphNode};
use paths::{
    display_path, display_segment, dynamic_key_placeholder, page_file_for, path_key,
    schema_file_for, slugify,
};

/// Generate the documentation site for every schema in the arena.
pub fn to_html_doc(ast: &Ast) -> BTreeMap<String, String> {
    let mut pages: BTreeMap<String, String> = BTreeMap::new();
    pages.insert("site.css".to_string(), assets::SITE_CSS.to_string());
    pages.insert("site.js".to_string(), assets::SITE_JS.to_string());

    // Schemas whose names collide after slugification get deterministic
    // numeric suffixes in schema order.
    let mut used: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<(&ConfigSchema, String)> = Vec::new();
    for (_, schema) in ast.schemas() {
        let base = slugify(&schema.name);
        let count = used.entry(base.clone()).or_insert(0);
        *count += 1;
        let slug = if *count == 1 {
            base
        } else {
            format!("{}-{}", base, count)
        };
        entries.push((schema, slug));
    }

    for (schema, slug) in &entries {
        let mut schema_pages = SchemaPages::new(ast, schema, slug);
        schema_pages.plan();
        schema_pages.render_all(&mut pages);
    }

    // Index listing
    let mut main = String::new();
    main.push_str(
        "<div class=\"card\"><div class=\"cardhead\"><h1>CSL Documentation</h1></div><div class=\"cardbody\">",
    );
    main.push_str("<p class=\"meta\">Schemas:</p><ul>");
    for (schema, slug) in &entries {
        let _ = write!(
            main,
            "<li><a class=\"link\" href=\"{}\"><code>{}</code></a></li>",
            html_escape(&schema_file_for(slug)),
            html_escape(&schema.name)
        );
    }
    main.push_str("</ul></div></div>");

    let shell = SchemaPages::bare(ast);
    pages.insert(
        "index.html".to_string(),
        shell.page_wrap("CSL Documentation", "index.html", &main, None),
    );
    pages
}

/// Escape text for HTML element and attribute content.
fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn key_anchor_id(key_name: &str) -> String {
    format!("k-{}", slugify(key_name))
}

#[derive(Debug, Clone)]
struct TablePageMeta {
    path: Vec<String>,
    table: TypeId,
    filename: String,
}

struct SchemaPages<'a> {
    ast: &'a Ast,
    schema: Option<&'a ConfigSchema>,
    slug: String,
    planned: Vec<TablePageMeta>,
    path_to_file: HashMap<String, String>,
}

impl<'a> SchemaPages<'a> {
    fn new(ast: &'a Ast, schema: &'a ConfigSchema, slug: &str) -> Self {
        Self {
            ast,
            schema: Some(schema),
            slug: slug.to_string(),
            planned: Vec::new(),
            path_to_file: HashMap::new(),
        }
    }

    /// A shell with no schema context, used for the index page.
    fn bare(ast: &'a Ast) -> Self {
        Self {
            ast,
            schema: None,
            slug: String::new(),
            planned: Vec::new(),
            path_to_file: HashMap::new(),
        }
    }

    // ---- planning -------------------------------------------------------

    /// Depth-first walk creating one page per reachable nested table.
    fn plan(&mut self) {
        let Some(schema) = self.schema else { return };
        let mut seen: HashSet<String> = HashSet::new();
        self.walk_plan(schema.root, &Vec::new(), &mut seen);
    }

    fn walk_plan(&mut self, table_ty: TypeId, path: &[String], seen: &mut HashSet<String>) {
        let Some(table) = self.ast.ty(table_ty).as_table() else {
            return;
        };

        if !path.is_empty() {
            let pk = path_key(path);
            if seen.insert(pk.clone()) {
                let filename = page_file_for(&self.slug, path);
                self.planned.push(TablePageMeta {
                    path: path.to_vec(),
                    table: table_ty,
                    filename: filename.clone(),
                });
                self.path_to_file.insert(pk, filename);
            }
        }

        let children = self.immediate_table_children(table);
        for (segment, child) in children {
            let mut child_path = path.to_vec();
            child_path.push(segment);
            self.walk_plan(child, &child_path, seen);
        }
    }

    /// The (segment, table type id) pairs directly reachable from `table`.
    fn immediate_table_children(&self, table: &TableType) -> Vec<(String, TypeId)> {
        let mut children = Vec::new();
        for &key_id in &table.explicit_keys {
            let key = self.ast.key(key_id);
            match self.ast.ty(key.ty) {
                CslType::Table(_) => children.push((key.name.clone(), key.ty)),
                CslType::Array { element, .. } => {
                    if matches!(self.ast.ty(*element), CslType::Table(_)) {
                        children.push((format!("{}[]", key.name), *element));
                    }
                }
                _ => {}
            }
        }
        if let Some(wildcard) = table.wildcard_key {
            let key = self.ast.key(wildcard);
            match self.ast.ty(key.ty) {
                CslType::Table(_) => children.push(("*".to_string(), key.ty)),
                CslType::Array { element, .. } => {
                    if matches!(self.ast.ty(*element), CslType::Table(_)) {
                        children.push(("*[]".to_string(), *element));
                    }
                }
                _ => {}
            }
        }
        children
    }

    // ---- type helpers ---------------------------------------------------

    fn type_label(&self, ty: TypeId) -> String {
        match self.ast.ty(ty) {
            CslType::Primitive(p) => {
                if p.allowed_values.is_empty() {
                    p.primitive.keyword().to_string()
                } else {
                    p.allowed_values
                        .iter()
                        .map(|(literal, _)| literal.as_str())
                        .collect::<Vec<_>>()
                        .join(" | ")
                }
            }
            CslType::Table(_) => "table".to_string(),
            CslType::Array { element, .. } => format!("{}[]", self.type_label(*element)),
            CslType::Union { members, .. } => members
                .iter()
                .map(|&m| self.type_label(m))
                .collect::<Vec<_>>()
                .join(" | "),
            CslType::AnyTable { .. } => "any{}".to_string(),
            CslType::AnyArray { .. } => "any[]".to_string(),
            CslType::Invalid { .. } => String::new(),
        }
    }

    fn is_enum_primitive(&self, ty: TypeId) -> bool {
        self.ast
            .ty(ty)
            .as_primitive()
            .is_some_and(|p| !p.allowed_values.is_empty())
    }

    fn count_keys(&self, table: &TableType) -> usize {
        table.explicit_keys.len() + usize::from(table.wildcard_key.is_some())
    }

    fn nested_depth(&self, ty: TypeId) -> usize {
        match self.ast.ty(ty) {
            CslType::Table(table) => {
                let mut max = 1;
                for &key in &table.explicit_keys {
                    max = max.max(1 + self.nested_depth(self.ast.key(key).ty));
                }
                if let Some(wildcard) = table.wildcard_key {
                    max = max.max(1 + self.nested_depth(self.ast.key(wildcard).ty));
                }
                max
            }
            CslType::Array { element, .. } => 1 + self.nested_depth(*element),
            CslType::Union { members, .. } => members
                .iter()
                .map(|&m| self.nested_depth(m))
                .max()
                .unwrap_or(0),
            _ => 0,
        }
    }

    fn annotations_plain(&self, annotations: &[Annotation]) -> String {
        annotations
            .iter()
            .map(|a| {
                let args = a
                    .args
                    .iter()
                    .map(|&arg| expr_to_string(self.ast, arg))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("@{}({})", a.name, args)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn annotations_html(&self, annotations: &[Annotation]) -> String {
        if annotations.is_empty() {
            return String::new();
        }
        let mut out = String::from("<div class=\"chips\">");
        for a in annotations {
            let args = a
                .args
                .iter()
                .map(|&arg| expr_to_string(self.ast, arg))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(
                out,
                "<span class=\"chip\"><code>{}</code></span>",
                html_escape(&format!("@{}({})", a.name, args))
            );
        }
        out.push_str("</div>");
        out
    }

    // ---- chrome ---------------------------------------------------------

    fn render_topbar(&self, table_path: Option<&[String]>) -> String {
        let mut out = String::new();
        out.push_str("<header class=\"topbar\">");
        out.push_str("<nav class=\"crumbs\">");
        out.push_str(
            "<a class=\"crumb\" href=\"index.html\"><span class=\"crumbtxt\">CSL Docs</span></a>",
        );

        if let Some(schema) = self.schema {
            let _ = write!(
                out,
                "<span class=\"sep\">/</span><a class=\"crumb\" href=\"{}\"><span class=\"crumbtxt\">{}</span></a>",
                html_escape(&schema_file_for(&self.slug)),
                html_escape(&schema.name)
            );

            if let Some(path) = table_path {
                let mut prefix: Vec<String> = Vec::with_capacity(path.len());
                for (i, segment) in path.iter().enumerate() {
                    let label = display_segment(&prefix, segment);
                    prefix.push(segment.clone());
                    let is_last = i + 1 == path.len();
                    out.push_str("<span class=\"sep\">&gt;</span>");
                    if is_last {
                        let _ = write!(
                            out,
                            "<span class=\"crumb current\" aria-current=\"page\"><span class=\"crumbtxt\">{}</span></span>",
                            html_escape(&label)
                        );
                    } else {
                        let _ = write!(
                            out,
                            "<a class=\"crumb\" href=\"{}\"><span class=\"crumbtxt\">{}</span></a>",
                            html_escape(&page_file_for(&self.slug, &prefix)),
                            html_escape(&label)
                        );
                    }
                }
            }
        }

        out.push_str("</nav>");
        out.push_str("<div class=\"actions\">");
        out.push_str(
            "<button class=\"iconbtn\" type=\"button\" data-theme-toggle aria-label=\"Toggle dark mode\"><span>Theme</span></button>",
        );
        out.push_str("</div></header>");
        out
    }

    fn render_sidebar(&self, current_file: &str) -> String {
        let mut out = String::new();
        out.push_str("<aside class=\"sidebar\">");
        out.push_str("<div class=\"navtitle\">Navigation</div>");
        out.push_str("<ul class=\"navlist\">");
        let _ = write!(
            out,
            "<li><a class=\"navitem {}\" href=\"index.html\">Index</a></li>",
            if current_file == "index.html" {
                "active"
            } else {
                ""
            }
        );

        if let Some(schema) = self.schema {
            let schema_file = schema_file_for(&self.slug);
            let _ = write!(
                out,
                "<li><a class=\"navitem {}\" href=\"{}\">Schema <code>{}</code></a></li>",
                if current_file == schema_file { "active" } else { "" },
                html_escape(&schema_file),
                html_escape(&schema.name)
            );

            if !self.planned.is_empty() {
                out.push_str("<div class=\"navtitle\">Tables</div>");
                let mut items: Vec<&TablePageMeta> = self.planned.iter().collect();
                items.sort_by_key(|meta| display_path(&meta.path));
                for meta in items {
                    let _ = write!(
                        out,
                        "<li><a class=\"navitem {}\" href=\"{}\"><code>{}</code></a></li>",
                        if current_file == meta.filename { "active" } else { "" },
                        html_escape(&meta.filename),
                        html_escape(&display_path(&meta.path))
                    );
                }
            }
        }

        out.push_str("</ul></aside>");
        out
    }

    fn page_wrap(
        &self,
        title: &str,
        current_file: &str,
        main_html: &str,
        table_path: Option<&[String]>,
    ) -> String {
        let mut out = String::new();
        out.push_str("<!DOCTYPE html><html><head>");
        out.push_str("<meta charset=\"utf-8\">");
        out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">");
        let _ = write!(out, "<title>{}</title>", html_escape(title));
        out.push_str("<link rel=\"stylesheet\" href=\"site.css\">");
        out.push_str("<script defer src=\"site.js\"></script>");
        out.push_str("</head><body>");
        out.push_str(&self.render_topbar(table_path));
        out.push_str("<div class=\"app\">");
        out.push_str(&self.render_sidebar(current_file));
        let _ = write!(out, "<main class=\"main\">{}</main>", main_html);
        out.push_str("</div></body></html>");
        out
    }

    // ---- structure graphs -----------------------------------------------

    fn render_schema_graph_card(&self) -> String {
        let Some(schema) = self.schema else {
            return String::new();
        };
        let mut nodes = vec![GraphNode {
            id: path_key(&[]),
            label: schema.name.clone(),
            file: schema_file_for(&self.slug),
            depth: 0,
        }];
        let mut edges = Vec::new();

        for meta in &self.planned {
            let mut parent_path = meta.path.clone();
            let segment = parent_path.pop().unwrap_or_default();
            let label = display_segment(&parent_path, &segment);
            nodes.push(GraphNode {
                id: path_key(&meta.path),
                label: label.clone(),
                file: self
                    .path_to_file
                    .get(&path_key(&meta.path))
                    .cloned()
                    .unwrap_or_default(),
                depth: meta.path.len(),
            });
            edges.push(GraphEdge {
                from: path_key(&parent_path),
                to: path_key(&meta.path),
                label,
            });
        }

        self.graph_card(&schema.name, &nodes, &edges, "This schema has no nested tables to visualize.")
    }

    fn render_table_graph_card(&self, meta: &TablePageMeta) -> String {
        let Some(schema) = self.schema else {
            return String::new();
        };
        let center_id = path_key(&meta.path);
        let center_label = {
            let mut parent_path = meta.path.clone();
            let segment = parent_path.pop().unwrap_or_default();
            if meta.path.is_empty() {
                schema.name.clone()
            } else {
                display_segment(&parent_path, &segment)
            }
        };
        let mut nodes = vec![GraphNode {
            id: center_id.clone(),
            label: center_label,
            file: meta.filename.clone(),
            depth: 0,
        }];
        let mut edges = Vec::new();

        if let Some(table) = self.ast.ty(meta.table).as_table() {
            for (segment, _) in self.immediate_table_children(table) {
                let mut child_path = meta.path.clone();
                child_path.push(segment.clone());
                let label = display_segment(&meta.path, &segment);
                nodes.push(GraphNode {
                    id: path_key(&child_path),
                    label: label.clone(),
                    file: self
                        .path_to_file
                        .get(&path_key(&child_path))
                        .cloned()
                        .unwrap_or_default(),
                    depth: 1,
                });
                edges.push(GraphEdge {
                    from: center_id.clone(),
                    to: path_key(&child_path),
                    label,
                });
            }
        }

        self.graph_card(&schema.name, &nodes, &edges, "This table has no nested tables.")
    }

    fn graph_card(
        &self,
        schema_name: &str,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
        empty_message: &str,
    ) -> String {
        let mut out = String::new();
        out.push_str("<div class=\"card\">");
        out.push_str("<div class=\"cardhead\"><h2>Structure graph</h2></div>");
        out.push_str("<div class=\"cardbody\">");
        if nodes.len() <= 1 {
            let _ = write!(out, "<p class=\"meta\">{}</p>", empty_message);
        } else {
            let json = build_structure_graph_json(schema_name, nodes, edges);
            let _ = write!(
                out,
                "<div class=\"graph\" data-structure-graph=\"{}\"><noscript><p class=\"meta\">Enable JavaScript to see the structure graph.</p></noscript></div>",
                html_escape(&json)
            );
        }
        out.push_str("</div></div>");
        out
    }

    // ---- keys table -----------------------------------------------------

    fn type_badges(&self, ty: TypeId) -> String {
        match self.ast.ty(ty) {
            CslType::AnyTable { .. } | CslType::AnyArray { .. } => {
                "<span class=\"badge warn\">Unvalidated</span>".to_string()
            }
            CslType::Union { .. } => "<span class=\"badge kind\">Union</span>".to_string(),
            _ if self.is_enum_primitive(ty) => {
                "<span class=\"badge kind\">Enum</span>".to_string()
            }
            _ => String::new(),
        }
    }

    fn required_badge(&self, optional: bool) -> &'static str {
        if optional {
            "<span class=\"badge opt\">Optional</span>"
        } else {
            "<span class=\"badge req\">Required</span>"
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn render_key_row(
        &self,
        out: &mut String,
        table_path: &[String],
        key_name: &str,
        key_display: &str,
        is_optional: bool,
        ty: TypeId,
        default_value: Option<&str>,
        annotations: &[Annotation],
        child_table_path: &[String],
        is_dynamic_key: bool,
    ) {
        let type_str = self.type_label(ty);
        let default_str = default_value.unwrap_or("");
        let annotations_plain = self.annotations_plain(annotations);
        let search = format!(
            "{} {} {} {} {}",
            key_display,
            type_str,
            if is_optional { "optional" } else { "required" },
            default_str,
            annotations_plain
        );

        let _ = write!(
            out,
            "<tr id=\"{}\" data-search=\"{}\">",
            html_escape(&key_anchor_id(key_name)),
            html_escape(&search)
        );

        // Key + copy path
        out.push_str("<td><div class=\"keycell\"><div class=\"left\">");
        let _ = write!(out, "<code>{}</code>", html_escape(key_display));
        if is_dynamic_key {
            out.push_str(
                "<div style=\"margin-top:6px\"><span class=\"badge kind\">Dynamic key</span></div>",
            );
        }
        out.push_str("</div>");
        let mut full_path = table_path.to_vec();
        full_path.push(key_name.to_string());
        let _ = write!(
            out,
            "<button class=\"iconbtn\" type=\"button\" data-copy=\"{}\" aria-label=\"Copy path\">Copy</button>",
            html_escape(&display_path(&full_path))
        );
        out.push_str("</div></td>");

        // Type
        out.push_str("<td><div class=\"chips\" style=\"margin-bottom:6px\">");
        let _ = write!(
            out,
            "<span class=\"chip\"><code>{}</code></span>",
            html_escape(&type_str)
        );
        out.push_str(&self.type_badges(ty));
        if let CslType::Table(table) = self.ast.ty(ty) {
            let _ = write!(
                out,
                "<span class=\"chip\"><code>{} keys</code></span><span class=\"chip\"><code>depth {}</code></span>",
                self.count_keys(table),
                self.nested_depth(ty)
            );
        }
        if matches!(self.ast.ty(ty), CslType::Array { .. }) {
            let _ = write!(
                out,
                "<span class=\"chip\"><code>depth {}</code></span>",
                self.nested_depth(ty)
            );
        }
        out.push_str("</div></td>");

        // Required
        let _ = write!(out, "<td>{}</td>", self.required_badge(is_optional));

        // Default
        out.push_str("<td>");
        if !default_str.is_empty() {
            let _ = write!(out, "<code>{}</code>", html_escape(default_str));
        }
        out.push_str("</td>");

        // Annotations
        let _ = write!(out, "<td>{}</td>", self.annotations_html(annotations));

        // Details: link to the child table page when one exists
        out.push_str("<td>");
        if !child_table_path.is_empty() {
            match self.path_to_file.get(&path_key(child_table_path)) {
                Some(file) => {
                    let _ = write!(
                        out,
                        "<a class=\"link\" href=\"{}\"><span class=\"badge kind\">Open</span></a>",
                        html_escape(file)
                    );
                }
                None => out.push_str("<span class=\"badge kind\">Open</span>"),
            }
        } else {
            out.push_str("<span class=\"meta\">&mdash;</span>");
        }
        out.push_str("</td></tr>");
    }

    fn render_keys_table(&self, out: &mut String, table_path: &[String], table: &TableType) {
        out.push_str("<div class=\"tablewrap\"><table id=\"keys-table\" class=\"keys\">");
        out.push_str("<thead><tr>");
        out.push_str("<th style=\"min-width:240px\">Key</th>");
        out.push_str("<th style=\"min-width:260px\">Type</th>");
        out.push_str("<th>Required</th>");
        out.push_str("<th style=\"min-width:160px\">Default</th>");
        out.push_str("<th style=\"min-width:220px\">Annotations</th>");
        out.push_str("<th style=\"min-width:110px\">Details</th>");
        out.push_str("</tr></thead><tbody>");

        let mut keys: Vec<_> = table
            .explicit_keys
            .iter()
            .map(|&k| self.ast.key(k))
            .collect();
        keys.sort_by(|a, b| a.name.cmp(&b.name));

        for key in keys {
            let child_path = self.child_path_for(table_path, &key.name, key.ty);
            self.render_key_row(
                out,
                table_path,
                &key.name,
                &quote_identifier(&key.name),
                key.is_optional,
                key.ty,
                key.default_value.as_ref().map(|(v, _)| v.as_str()),
                &key.annotations,
                &child_path,
                false,
            );
        }

        if let Some(wildcard) = table.wildcard_key {
            let key = self.ast.key(wildcard);
            let dyn_name = dynamic_key_placeholder(table_path);
            let mut display = dyn_name.clone();
            let mut child_path: Vec<String> = Vec::new();
            match self.ast.ty(key.ty) {
                CslType::Table(_) => {
                    child_path = table_path.to_vec();
                    child_path.push("*".to_string());
                }
                CslType::Array { element, .. } => {
                    if matches!(self.ast.ty(*element), CslType::Table(_)) {
                        child_path = table_path.to_vec();
                        child_path.push("*[]".to_string());
                        display = format!("{}[]", dyn_name);
                    }
                }
                _ => {}
            }
            self.render_key_row(
                out,
                table_path,
                "*",
                &display,
                key.is_optional,
                key.ty,
                key.default_value.as_ref().map(|(v, _)| v.as_str()),
                &key.annotations,
                &child_path,
                true,
            );
        }

        out.push_str("</tbody></table></div>");
    }

    fn child_path_for(&self, table_path: &[String], key_name: &str, ty: TypeId) -> Vec<String> {
        match self.ast.ty(ty) {
            CslType::Table(_) => {
                let mut path = table_path.to_vec();
                path.push(key_name.to_string());
                path
            }
            CslType::Array { element, .. } if matches!(self.ast.ty(*element), CslType::Table(_)) => {
                let mut path = table_path.to_vec();
                path.push(format!("{}[]", key_name));
                path
            }
            _ => Vec::new(),
        }
    }

    // ---- constraints ----------------------------------------------------

    fn identifier_name(&self, expr: ExprId) -> Option<String> {
        match self.ast.expr(expr) {
            Expr::Identifier { name, .. } => Some(name.clone()),
            _ => None,
        }
    }

    fn render_constraints(&self, out: &mut String, table: &TableType, known_keys: &HashSet<String>) {
        if table.constraints.is_empty() {
            return;
        }

        let link_key = |key: &str| -> String {
            if known_keys.contains(key) {
                format!(
                    "<a class=\"link\" href=\"#{}\"><code>{}</code></a>",
                    html_escape(&key_anchor_id(key)),
                    html_escape(key)
                )
            } else {
                format!("<code>{}</code>", html_escape(key))
            }
        };

        out.push_str("<div class=\"card\">");
        out.push_str("<div class=\"cardhead\"><h2>Constraints</h2></div>");
        out.push_str("<div class=\"cardbody\">");
        out.push_str(
            "<p class=\"meta\">Rules declared in this table's <code>constraints</code> block.</p>",
        );

        for constraint in &table.constraints {
            let (kind_badge, title, sentence, code_line) = match constraint {
                Constraint::Conflict { first, second, .. } => {
                    let a = self.identifier_name(*first);
                    let b = self.identifier_name(*second);
                    let first_str = expr_to_string(self.ast, *first);
                    let second_str = expr_to_string(self.ast, *second);
                    let sentence = match (a, b) {
                        (Some(a), Some(b)) => format!(
                            "Keys {} and {} cannot both be present.",
                            link_key(&a),
                            link_key(&b)
                        ),
                        (Some(a), None) => format!(
                            "Key {} cannot be present when condition <code>{}</code> holds.",
                            link_key(&a),
                            html_escape(&second_str)
                        ),
                        (None, Some(b)) => format!(
                            "Condition <code>{}</code> cannot hold when key {} is present.",
                            html_escape(&first_str),
                            link_key(&b)
                        ),
                        (None, None) => {
                            "These two conditions cannot both hold simultaneously.".to_string()
                        }
                    };
                    (
                        "<span class=\"badge bad\">Conflict</span>",
                        "Mutual exclusion",
                        sentence,
                        format!("conflicts {} with {};", first_str, second_str),
                    )
                }
                Constraint::Dependency {
                    dependent,
                    condition,
                    ..
                } => {
                    let a = self.identifier_name(*dependent);
                    let b = self.identifier_name(*condition);
                    let dependent_str = expr_to_string(self.ast, *dependent);
                    let condition_str = expr_to_string(self.ast, *condition);
                    let sentence = match (a, b) {
                        (Some(a), Some(b)) => format!(
                            "If key {} is present, then key {} must be present.",
                            link_key(&a),
                            link_key(&b)
                        ),
                        (Some(a), None) => format!(
                            "If key {} is present, then <code>{}</code> must hold.",
                            link_key(&a),
                            html_escape(&condition_str)
                        ),
                        (None, Some(b)) => format!(
                            "If <code>{}</code> holds, then key {} must be present.",
                            html_escape(&dependent_str),
                            link_key(&b)
                        ),
                        (None, None) => format!(
                            "If <code>{}</code> holds, then <code>{}</code> must hold.",
                            html_escape(&dependent_str),
                            html_escape(&condition_str)
                        ),
                    };
                    (
                        "<span class=\"badge kind\">Requires</span>",
                        "Dependency",
                        sentence,
                        format!("requires {} => {};", dependent_str, condition_str),
                    )
                }
                Constraint::Validate { expr, .. } => {
                    let expr_str = expr_to_string(self.ast, *expr);
                    (
                        "<span class=\"badge warn\">Validate</span>",
                        "Validation",
                        format!(
                            "The configuration must satisfy: <code>{}</code>.",
                            html_escape(&expr_str)
                        ),
                        format!("validate {};", expr_str),
                    )
                }
            };

            out.push_str("<div class=\"constraint\" style=\"margin:10px 0\">");
            out.push_str("<div class=\"row\">");
            let _ = write!(
                out,
                "<div class=\"title\">{} {}</div>",
                kind_badge,
                html_escape(title)
            );
            let _ = write!(
                out,
                "<button class=\"iconbtn\" type=\"button\" data-copy=\"{}\">Copy rule</button>",
                html_escape(&code_line)
            );
            out.push_str("</div>");
            let _ = write!(out, "<p>{}</p>", sentence);
            let _ = write!(out, "<pre><code>{}</code></pre>", html_escape(&code_line));
            out.push_str("</div>");
        }

        out.push_str("</div></div>");
    }

    fn known_keys(&self, table: &TableType) -> HashSet<String> {
        let mut known: HashSet<String> = table
            .explicit_keys
            .iter()
            .map(|&k| self.ast.key(k).name.clone())
            .collect();
        if table.wildcard_key.is_some() {
            known.insert("*".to_string());
        }
        known
    }

    // ---- pages ----------------------------------------------------------

    fn render_schema_root_page(&self, pages: &mut BTreeMap<String, String>) {
        let Some(schema) = self.schema else { return };
        let root = self.ast.root_table(schema);
        let known = self.known_keys(root);
        let mut main = String::new();

        // Overview card
        main.push_str("<div class=\"card\"><div class=\"cardhead\">");
        let _ = write!(
            main,
            "<h1>Schema <code>{}</code></h1>",
            html_escape(&schema.name)
        );
        main.push_str(
            "<button class=\"iconbtn\" type=\"button\" data-copy-el=\"schema-src\">Copy schema</button>",
        );
        main.push_str("</div><div class=\"cardbody\">");
        main.push_str("<div class=\"kpis\">");
        let _ = write!(
            main,
            "<div class=\"kpi\"><div class=\"k\">Top-level keys</div><div class=\"v\">{}</div></div>",
            self.count_keys(root)
        );
        let _ = write!(
            main,
            "<div class=\"kpi\"><div class=\"k\">Has wildcard</div><div class=\"v\">{}</div></div>",
            if root.wildcard_key.is_some() { "Yes" } else { "No" }
        );
        let _ = write!(
            main,
            "<div class=\"kpi\"><div class=\"k\">Max depth</div><div class=\"v\">{}</div></div>",
            self.nested_depth(schema.root)
        );
        main.push_str("</div>");
        main.push_str("<p class=\"meta\" style=\"margin-top:10px\">Full schema (as CSL):</p>");
        let _ = write!(
            main,
            "<pre><code id=\"schema-src\">{}</code></pre>",
            html_escape(&schema_to_csl(self.ast, schema))
        );
        main.push_str("</div></div>");

        // Structure graph over all descendants
        main.push_str(&self.render_schema_graph_card());

        // Keys card
        main.push_str("<div class=\"card\"><div class=\"cardhead\"><h2>Keys</h2>");
        main.push_str(
            "<input class=\"filter\" placeholder=\"Filter keys (name, type, annotation...)\" data-filter-table=\"keys-table\" aria-label=\"Filter keys\">",
        );
        main.push_str("</div><div class=\"cardbody\">");
        if root.wildcard_key.is_some() {
            let _ = write!(
                main,
                "<div class=\"callout\" style=\"margin-bottom:12px\"><strong>Dynamic keys:</strong> this table allows additional keys like <code>{}</code>. Explicit keys take precedence over wildcard rules.</div>",
                html_escape(&dynamic_key_placeholder(&[]))
            );
        }
        self.render_keys_table(&mut main, &[], root);
        main.push_str("</div></div>");

        self.render_constraints(&mut main, root, &known);

        let filename = schema_file_for(&self.slug);
        let html = self.page_wrap(&schema.name, &filename, &main, None);
        pages.insert(filename, html);
    }

    fn render_table_page(&self, meta: &TablePageMeta, pages: &mut BTreeMap<String, String>) {
        let Some(schema) = self.schema else { return };
        let Some(table) = self.ast.ty(meta.table).as_table() else {
            return;
        };
        let known = self.known_keys(table);
        let mut main = String::new();

        // Header card
        main.push_str("<div class=\"card\"><div class=\"cardhead\">");
        let _ = write!(
            main,
            "<h1>Table <code>{}</code></h1>",
            html_escape(&display_path(&meta.path))
        );
        let _ = write!(
            main,
            "<a class=\"iconbtn\" href=\"{}\">Back to schema</a>",
            html_escape(&schema_file_for(&self.slug))
        );
        main.push_str("</div><div class=\"cardbody\">");
        let _ = write!(
            main,
            "<p class=\"meta\">Belongs to schema <code>{}</code> at path <code>{}</code>.</p>",
            html_escape(&schema.name),
            html_escape(&display_path(&meta.path))
        );
        main.push_str("<div class=\"kpis\">");
        let _ = write!(
            main,
            "<div class=\"kpi\"><div class=\"k\">Keys</div><div class=\"v\">{}</div></div>",
            self.count_keys(table)
        );
        let _ = write!(
            main,
            "<div class=\"kpi\"><div class=\"k\">Has wildcard</div><div class=\"v\">{}</div></div>",
            if table.wildcard_key.is_some() { "Yes" } else { "No" }
        );
        main.push_str("</div></div></div>");

        // Immediate-children graph
        main.push_str(&self.render_table_graph_card(meta));

        // Keys card
        main.push_str("<div class=\"card\"><div class=\"cardhead\"><h2>Keys</h2>");
        main.push_str(
            "<input class=\"filter\" placeholder=\"Filter keys...\" data-filter-table=\"keys-table\" aria-label=\"Filter keys\">",
        );
        main.push_str("</div><div class=\"cardbody\">");
        if table.wildcard_key.is_some() {
            // The placeholder names the parent object; strip a trailing
            // wildcard segment when this table itself sits under one.
            let mut parent_path = meta.path.clone();
            if parent_path
                .last()
                .is_some_and(|segment| segment == "*" || segment == "*[]")
            {
                parent_path.pop();
            }
            let _ = write!(
                main,
                "<div class=\"callout\" style=\"margin-bottom:12px\"><strong>Dynamic keys:</strong> this table allows additional keys like <code>{}</code>. Explicit keys take precedence over wildcard rules.</div>",
                html_escape(&dynamic_key_placeholder(&parent_path))
            );
        }
        self.render_keys_table(&mut main, &meta.path, table);
        main.push_str("</div></div>");

        self.render_constraints(&mut main, table, &known);

        let title = format!("{} / {}", schema.name, display_path(&meta.path));
        let html = self.page_wrap(&title, &meta.filename, &main, Some(&meta.path));
        pages.insert(meta.filename.clone(), html);
    }

    fn render_all(&mut self, pages: &mut BTreeMap<String, String>) {
        let planned = self.planned.clone();
        for meta in &planned {
            self.render_table_page(meta, pages);
        }
        self.render_schema_root_page(pages);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csl_parse::parse;
    use csl_tokenizer::lex;

    fn docs_for(source: &str) -> BTreeMap<String, String> {
        let lexed = lex(source, false);
        assert!(lexed.errors.is_empty(), "lex errors: {:?}", lexed.errors);
        let parsed = parse(&lexed.tokens);
        assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
        to_html_doc(&parsed.ast)
    }

    #[test]
    fn test_minimal_site_layout() {
        let pages = docs_for("config App { x: string; }");
        assert!(pages.contains_key("index.html"));
        assert!(pages.contains_key("app.html"));
        assert!(pages.contains_key("site.css"));
        assert!(pages.contains_key("site.js"));
        assert_eq!(pages.len(), 4);

        let index = &pages["index.html"];
        assert!(index.contains("app.html"));
        let schema = &pages["app.html"];
        assert!(schema.contains("Schema <code>App</code>"));
        assert!(schema.contains("id=\"k-x\""));
        assert!(schema.contains("config App {"));
    }

    #[test]
    fn test_nested_table_pages() {
        let pages = docs_for(
            "config App { db: { host: string; opts: { ssl: boolean; }; }; jobs: { name: string; }[]; }",
        );
        assert!(pages.contains_key("app-db.html"));
        assert!(pages.contains_key("app-db-opts.html"));
        assert!(pages.contains_key("app-jobs.html"));

        let db = &pages["app-db.html"];
        assert!(db.contains("Table <code>db</code>"));
        assert!(db.contains("data-structure-graph"));
        // parent page links to child
        let schema = &pages["app.html"];
        assert!(schema.contains("app-db.html"));
    }

    #[test]
    fn test_wildcard_pages_and_placeholder() {
        let pages =
            docs_for("config App { services: { *: { port: number; }; }; }");
        assert!(pages.contains_key("app-services.html"));
        assert!(pages.contains_key("app-services-wildcard.html"));

        let services = &pages["app-services.html"];
        assert!(services.contains("&lt;serviceKey&gt;"));
        assert!(services.contains("Dynamic key"));
    }

    #[test]
    fn test_constraint_cross_links() {
        let pages = docs_for(
            "config App { a: boolean; b: boolean; constraints { conflicts a with b; } }",
        );
        let schema = &pages["app.html"];
        assert!(schema.contains("href=\"#k-a\""));
        assert!(schema.contains("href=\"#k-b\""));
        assert!(schema.contains("conflicts a with b;"));
        assert!(schema.contains("Mutual exclusion"));
    }

    #[test]
    fn test_duplicate_schema_slugs_disambiguated() {
        let pages = docs_for("config App { x: string; }\nconfig `app` { y: string; }");
        assert!(pages.contains_key("app.html"));
        assert!(pages.contains_key("app-2.html"));
    }

    #[test]
    fn test_kpis_present() {
        let pages = docs_for("config App { a: string; b: { c: number; }; *: any{}; }");
        let schema = &pages["app.html"];
        assert!(schema.contains("Top-level keys"));
        assert!(schema.contains("Has wildcard"));
        assert!(schema.contains("Max depth"));
        assert!(schema.contains("Unvalidated"));
    }
}
