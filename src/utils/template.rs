//! String template rendering utilities.

use std::collections::HashMap;

pub struct TemplateVars;

impl TemplateVars {
    pub const ARTIFACT: &'static str = "artifact";
    pub const ARTIFACTS: &'static str = "artifacts";
    pub const REMOTE_DIR: &'static str = "remoteDir";
}

pub fn render_map(template: &str, variables: &HashMap<String, String>) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

pub fn is_present(template: &str, key: &str) -> bool {
    let placeholder = format!("{{{{{}}}}}", key);
    template.contains(&placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_known_placeholders() {
        let rendered = render_map(
            "dpkg -i {{artifacts}}",
            &vars(&[(TemplateVars::ARTIFACTS, "pkg_1.0_all.deb")]),
        );
        assert_eq!(rendered, "dpkg -i pkg_1.0_all.deb");
    }

    #[test]
    fn leaves_unknown_placeholders_alone() {
        let rendered = render_map("echo {{unknown}}", &vars(&[("artifact", "x")]));
        assert_eq!(rendered, "echo {{unknown}}");
    }

    #[test]
    fn is_present_detects_placeholder() {
        assert!(is_present("cd {{remoteDir}} && ls", TemplateVars::REMOTE_DIR));
        assert!(!is_present("ls", TemplateVars::REMOTE_DIR));
    }
}
