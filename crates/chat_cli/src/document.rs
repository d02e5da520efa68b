//! Standalone HTML page wrapped around a rendered answer fragment.

pub const MERMAID_SCRIPT_URL: &str = "https://cdn.jsdelivr.net/npm/mermaid/dist/mermaid.min.js";

/// Colors shared by the page styles and the diagram theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background_primary: &'static str,
    pub background_secondary: &'static str,
    pub background_tertiary: &'static str,
    pub text_primary: &'static str,
    pub text_secondary: &'static str,
    pub accent: &'static str,
    pub border: &'static str,
}

pub const LIGHT_PALETTE: Palette = Palette {
    background_primary: "#ffffff",
    background_secondary: "#f5f7f9",
    background_tertiary: "#e9ecef",
    text_primary: "#2d3436",
    text_secondary: "#636e72",
    accent: "#0984e3",
    border: "#dfe6e9",
};

impl Default for Palette {
    fn default() -> Self {
        LIGHT_PALETTE
    }
}

fn styles(palette: &Palette) -> String {
    let Palette {
        background_secondary,
        background_tertiary,
        text_primary,
        text_secondary,
        accent,
        border,
        ..
    } = palette;

    format!(
        r#"body {{
  background-color: {background_tertiary};
  color: {text_primary};
  font-family: 'Consolas', 'Menlo', 'Monaco', monospace;
  padding: 8px;
  margin: 0;
}}
pre {{
  background-color: {background_secondary};
  padding: 8px;
  border-radius: 4px;
  overflow-x: auto;
}}
code {{
  font-family: 'Consolas', 'Menlo', 'Monaco', monospace;
}}
a {{
  color: {accent};
}}
table {{
  border-collapse: collapse;
  width: 100%;
  margin: 8px 0;
}}
th, td {{
  border: 1px solid {border};
  padding: 6px;
}}
th {{
  background-color: {background_secondary};
}}
.mermaid {{
  background-color: {background_secondary};
  padding: 8px;
  border-radius: 4px;
  margin: 8px 0;
}}
.nested-list {{
  color: {text_secondary};
}}
h3 {{
  margin-top: 16px;
  margin-bottom: 8px;
}}
hr {{
  border: none;
  border-top: 1px solid {border};
  margin: 16px 0;
}}"#
    )
}

fn mermaid_init(palette: &Palette) -> String {
    let Palette {
        background_primary,
        background_secondary,
        background_tertiary,
        text_primary,
        accent,
        border,
        ..
    } = palette;

    format!(
        r#"mermaid.initialize({{
  startOnLoad: true,
  theme: 'dark',
  themeVariables: {{
    'background-color': '{background_secondary}',
    'primaryColor': '{accent}',
    'primaryTextColor': '{text_primary}',
    'primaryBorderColor': '{border}',
    'lineColor': '{text_primary}',
    'secondaryColor': '{background_tertiary}',
    'tertiaryColor': '{background_primary}'
  }},
  securityLevel: 'loose',
  fontFamily: 'Consolas, Menlo, Monaco, monospace'
}});"#
    )
}

/// Wrap an answer fragment in a full page that loads the diagram runtime.
pub fn render_document(fragment: &str, palette: &Palette) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<script src=\"{MERMAID_SCRIPT_URL}\"></script>\n<style>\n{styles}\n</style>\n</head>\n<body>\n{fragment}\n<script>\n{init}\n</script>\n</body>\n</html>\n",
        styles = styles(palette),
        init = mermaid_init(palette),
    )
}
