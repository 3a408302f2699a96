//! Language extractors for the indexed languages

pub mod cpp;
pub mod csharp;
pub mod javascript;
pub mod python;

use vibe_core::Language;

use crate::extractor::LanguageExtractor;

/// One extractor per language, built once and shared across worker threads.
pub struct ExtractorSet {
    csharp: csharp::CSharpExtractor,
    python: python::PythonExtractor,
}

impl ExtractorSet {
    pub fn new(critical_tags: &[String]) -> Self {
        Self {
            csharp: csharp::CSharpExtractor::new(critical_tags.to_vec()),
            python: python::PythonExtractor::new(critical_tags.to_vec()),
        }
    }

    pub fn get(&self, language: Language) -> Option<&dyn LanguageExtractor> {
        match language {
            Language::CSharp => Some(&self.csharp),
            Language::Python => Some(&self.python),
            Language::JavaScript | Language::TypeScript => Some(&javascript::JavaScriptExtractor),
            Language::C | Language::Cpp => Some(&cpp::CppExtractor),
            Language::ProjectFile | Language::Solution | Language::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_extractor_detection() {
        let test_cases = [
            ("App.cs", true),
            ("lib.py", true),
            ("index.js", true),
            ("app.tsx", true),
            ("main.cpp", true),
            ("api.h", true),
            ("App.csproj", false),
            ("README.md", false),
        ];

        let set = ExtractorSet::new(&[]);
        for (filename, expected) in test_cases {
            let path = Path::new(filename);
            let extractor = set.get(Language::from_path(path));
            assert_eq!(extractor.is_some(), expected, "extractor for {}", filename);

            // Empty content never fails
            if let Some(extractor) = extractor {
                let result = extractor.extract(path, b"").unwrap();
                assert!(result.symbols.is_empty());
            }
        }
    }
}
