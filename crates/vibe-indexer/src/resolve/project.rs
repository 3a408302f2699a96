//! Project and solution references: the coarse graph

use std::sync::LazyLock;

use regex::Regex;
use vibe_core::{DependencyEdge, EdgeKind, Language, join_rel, parent_dir};

use super::ResolverContext;

static PROJECT_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<ProjectReference\s+Include\s*=\s*"([^"]+)""#).expect("project reference regex")
});

static SLN_PROJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*Project\("[^"]*"\)\s*=\s*"([^"]*)"\s*,\s*"([^"]+)""#).expect("solution project regex")
});

impl ResolverContext {
    /// Coarse edges declared by a project or solution file.
    ///
    /// Targets are normalized against the declaring file's directory and kept
    /// only when indexed.
    pub fn coarse_edges(&self, path: &str, language: Language, content: &str) -> Vec<DependencyEdge> {
        let dir = parent_dir(path);
        let mut edges: Vec<DependencyEdge> = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let (kind, raw, detail) = match language {
                Language::ProjectFile => match PROJECT_REF_RE.captures(line) {
                    Some(caps) => (EdgeKind::ProjectRef, caps[1].to_string(), caps[1].to_string()),
                    None => continue,
                },
                Language::Solution => match SLN_PROJECT_RE.captures(line) {
                    Some(caps) => (EdgeKind::SlnProject, caps[2].to_string(), caps[1].to_string()),
                    None => continue,
                },
                _ => return edges,
            };
            let Some(target) = join_rel(dir, &raw) else {
                continue;
            };
            if target == path || !self.contains(&target) {
                tracing::trace!("Dropping {} {} -> {}", kind, path, raw);
                continue;
            }
            if edges.iter().any(|e| e.to == target) {
                continue;
            }
            let mut edge = DependencyEdge::new(path, target, kind);
            edge.line = u32::try_from(idx + 1).ok();
            edge.detail = Some(detail);
            edges.push(edge);
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe_core::ArchitectureConfig;

    fn ctx() -> ResolverContext {
        ResolverContext::new(
            ["App.sln", "src/App/App.csproj", "src/Core/Core.csproj", "src/Data/Data.csproj"],
            &ArchitectureConfig::default(),
        )
    }

    #[test]
    fn test_project_references() {
        let csproj = r#"<Project Sdk="Microsoft.NET.Sdk">
  <ItemGroup>
    <ProjectReference Include="..\Core\Core.csproj" />
    <ProjectReference Include="../Data/Data.csproj" />
    <ProjectReference Include="..\Missing\Missing.csproj" />
  </ItemGroup>
</Project>
"#;
        let edges = ctx().coarse_edges("src/App/App.csproj", Language::ProjectFile, csproj);
        let found: Vec<(&str, Option<u32>)> = edges.iter().map(|e| (e.to.as_str(), e.line)).collect();
        assert_eq!(found, vec![("src/Core/Core.csproj", Some(3)), ("src/Data/Data.csproj", Some(4))]);
        assert!(edges.iter().all(|e| e.kind == EdgeKind::ProjectRef));
    }

    #[test]
    fn test_solution_entries() {
        let sln = r#"Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "App", "src\App\App.csproj", "{1}"
EndProject
Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = "Solution Items", "Solution Items", "{2}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Core", "src\Core\Core.csproj", "{3}"
EndProject
"#;
        let edges = ctx().coarse_edges("App.sln", Language::Solution, sln);
        let found: Vec<(&str, Option<&str>)> =
            edges.iter().map(|e| (e.to.as_str(), e.detail.as_deref())).collect();
        assert_eq!(
            found,
            vec![("src/App/App.csproj", Some("App")), ("src/Core/Core.csproj", Some("Core"))]
        );
        assert!(edges.iter().all(|e| e.kind == EdgeKind::SlnProject));
    }

    #[test]
    fn test_other_languages_have_no_coarse_edges() {
        assert!(ctx().coarse_edges("a.py", Language::Python, "import x").is_empty());
    }
}
