use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use ard_shader_core::{
    io,
    prelude::{ContentHash, ShaderStage, StageFlags},
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    directive::{self, identifiers, is_pragma_once, leading_ident, strip_line_comment},
    error::PreprocessError,
    expr,
    include::{is_include_guarded, parse_include_target, IncludeRecord, IncludeResolver},
    metadata::StageMetadata,
};

/// Macros starting with this prefix are engine-reserved. Shaders referencing one are recorded as
/// acknowledging it, so changing the macro later knows which shaders to rebuild.
pub const SPECIAL_MACRO_PREFIX: &str = "__ARD_";

/// Preprocessed source text for every stage of one shader file.
pub type ShaderSource = BTreeMap<ShaderStage, String>;

#[derive(Debug, Clone)]
pub struct PreprocessedStage {
    pub source: String,
    pub metadata: StageMetadata,
}

#[derive(Debug, Default)]
pub struct PreprocessOutput {
    /// Stages that were preprocessed successfully.
    pub stages: BTreeMap<ShaderStage, PreprocessedStage>,
    /// Stages that failed. A failure in one stage does not affect its siblings.
    pub errors: Vec<PreprocessError>,
    /// Global and engine-reserved macros referenced by any stage.
    pub acknowledged_macros: BTreeSet<String>,
}

pub struct Preprocessor {
    resolver: IncludeResolver,
    /// Engine wide macros. An empty value defines the macro without a replacement.
    global_macros: BTreeMap<String, String>,
}

impl PreprocessOutput {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn source(&self) -> ShaderSource {
        self.stages
            .iter()
            .map(|(stage, processed)| (*stage, processed.source.clone()))
            .collect()
    }

    pub fn metadata(&self) -> BTreeMap<ShaderStage, StageMetadata> {
        self.stages
            .iter()
            .map(|(stage, processed)| (*stage, processed.metadata.clone()))
            .collect()
    }

    pub fn stage_flags(&self) -> StageFlags {
        self.stages.keys().copied().collect()
    }
}

impl Preprocessor {
    pub fn new(resolver: IncludeResolver, global_macros: BTreeMap<String, String>) -> Self {
        Self {
            resolver,
            global_macros,
        }
    }

    #[inline(always)]
    pub fn resolver(&self) -> &IncludeResolver {
        &self.resolver
    }

    #[inline(always)]
    pub fn global_macros(&self) -> &BTreeMap<String, String> {
        &self.global_macros
    }

    pub fn preprocess_file(&self, path: &Path) -> Result<PreprocessOutput, PreprocessError> {
        let source = io::read_text(path).map_err(|source| PreprocessError::Read {
            file: path.into(),
            source,
        })?;
        self.preprocess(path, &source)
    }

    /// Splits `source` into stages and expands each one.
    ///
    /// Problems that affect the whole file (unknown or duplicate stage markers) are returned as
    /// an error. Problems inside a stage are collected in [`PreprocessOutput::errors`].
    pub fn preprocess(
        &self,
        path: &Path,
        source: &str,
    ) -> Result<PreprocessOutput, PreprocessError> {
        let mut output = PreprocessOutput::default();

        for stage_text in split_stages(path, source)? {
            let expander = StageExpander::new(self, path, stage_text.stage);
            match expander.run(&stage_text.lines) {
                Ok((processed, acknowledged)) => {
                    output.acknowledged_macros.extend(acknowledged);
                    output.stages.insert(stage_text.stage, processed);
                }
                Err(err) => output.errors.push(err),
            }
        }

        Ok(output)
    }
}

/// Raw text of one stage as numbered lines of the root file.
struct StageText<'a> {
    stage: ShaderStage,
    lines: Vec<(usize, &'a str)>,
}

fn split_stages<'a>(path: &Path, source: &'a str) -> Result<Vec<StageText<'a>>, PreprocessError> {
    let mut prologue = Vec::default();
    let mut stages = Vec::<StageText>::default();

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;

        if let Some(name) = directive::stage_marker(line) {
            let stage = ShaderStage::from_marker(name).ok_or_else(|| {
                PreprocessError::UnknownStageMarker {
                    file: path.into(),
                    line: line_no,
                    name: name.into(),
                }
            })?;

            if stages.iter().any(|text| text.stage == stage) {
                return Err(PreprocessError::DuplicateStage {
                    file: path.into(),
                    line: line_no,
                    stage,
                });
            }

            stages.push(StageText {
                stage,
                lines: prologue.clone(),
            });
            continue;
        }

        match stages.last_mut() {
            Some(text) => text.lines.push((line_no, line)),
            None => prologue.push((line_no, line)),
        }
    }

    // Single stage files name their stage with the extension
    if stages.is_empty() {
        let stage = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ShaderStage::from_extension)
            .ok_or_else(|| PreprocessError::UnknownStage { file: path.into() })?;
        stages.push(StageText {
            stage,
            lines: prologue,
        });
    }

    Ok(stages)
}

/// State of one `#if` / `#ifdef` block.
#[derive(Debug, Copy, Clone)]
struct Conditional {
    parent_active: bool,
    /// A branch of this block has already been selected.
    taken: bool,
    active: bool,
    seen_else: bool,
}

impl Conditional {
    fn new(parent_active: bool, cond: bool) -> Self {
        let active = parent_active && cond;
        Self {
            parent_active,
            taken: active,
            active,
            seen_else: false,
        }
    }
}

struct StageExpander<'a> {
    preprocessor: &'a Preprocessor,
    file: &'a Path,
    stage: ShaderStage,
    defines: FxHashMap<String, String>,
    lines: Vec<String>,
    version_line: Option<usize>,
    metadata: StageMetadata,
    guarded_seen: FxHashSet<PathBuf>,
    include_stack: Vec<PathBuf>,
    acknowledged: BTreeSet<String>,
}

impl<'a> StageExpander<'a> {
    fn new(preprocessor: &'a Preprocessor, file: &'a Path, stage: ShaderStage) -> Self {
        Self {
            preprocessor,
            file,
            stage,
            defines: preprocessor
                .global_macros
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            lines: Vec::default(),
            version_line: None,
            metadata: StageMetadata::default(),
            guarded_seen: FxHashSet::default(),
            include_stack: Vec::default(),
            acknowledged: BTreeSet::default(),
        }
    }

    fn run(
        mut self,
        root: &[(usize, &str)],
    ) -> Result<(PreprocessedStage, BTreeSet<String>), PreprocessError> {
        let root_path = std::fs::canonicalize(self.file).unwrap_or_else(|_| self.file.into());
        self.include_stack.push(root_path);
        self.process(self.file, root.iter().copied(), 0)?;

        // Global macros the stage refers to are defined right after `#version`
        let injected: Vec<String> = self
            .acknowledged
            .iter()
            .filter_map(|name| {
                self.preprocessor
                    .global_macros
                    .get(name)
                    .map(|value| define_line(name, value))
            })
            .collect();
        let at = self.version_line.map_or(0, |idx| idx + 1);
        self.lines.splice(at..at, injected);

        let mut source = self.lines.join("\n");
        source.push('\n');
        self.metadata.hash = ContentHash::of(&source);

        Ok((
            PreprocessedStage {
                source,
                metadata: self.metadata,
            },
            self.acknowledged,
        ))
    }

    fn process<'t>(
        &mut self,
        current: &Path,
        lines: impl Iterator<Item = (usize, &'t str)>,
        depth: u32,
    ) -> Result<(), PreprocessError> {
        let mut conditionals = Vec::<Conditional>::default();
        let mut lines = lines;

        while let Some((line_no, first)) = lines.next() {
            let is_directive = first.trim_start().starts_with('#');

            // Directives may continue onto following lines
            let mut physical = vec![first];
            if is_directive {
                let mut last = first;
                while last.trim_end().ends_with('\\') {
                    match lines.next() {
                        Some((_, next)) => {
                            physical.push(next);
                            last = next;
                        }
                        None => break,
                    }
                }
            }

            let active = conditionals.last().map_or(true, |cond| cond.active);
            let logical = physical
                .iter()
                .map(|line| line.trim_end().trim_end_matches('\\'))
                .collect::<Vec<_>>()
                .join(" ");

            let directive = match is_directive.then(|| directive::parse(&logical)).flatten() {
                Some(directive) => directive,
                None => {
                    if active {
                        self.acknowledge(&logical);
                        self.emit(&physical);
                    }
                    continue;
                }
            };

            match directive.name {
                "ifdef" | "ifndef" => {
                    let name = leading_ident(directive.rest)
                        .map(|(name, _)| name)
                        .ok_or_else(|| {
                            self.directive_error(
                                current,
                                line_no,
                                format!("#{} requires a macro name", directive.name),
                            )
                        })?;
                    if active {
                        self.acknowledge(name);
                    }
                    let defined = self.defines.contains_key(name);
                    let cond = if directive.name == "ifdef" {
                        defined
                    } else {
                        !defined
                    };
                    conditionals.push(Conditional::new(active, cond));
                }
                "if" => {
                    let cond = active && self.evaluate(current, line_no, directive.rest)?;
                    conditionals.push(Conditional::new(active, cond));
                }
                "elif" => {
                    let Some(top) = conditionals.last_mut() else {
                        return Err(self.directive_error(current, line_no, "#elif without #if"));
                    };
                    if top.seen_else {
                        return Err(self.directive_error(current, line_no, "#elif after #else"));
                    }

                    if top.parent_active && !top.taken {
                        let cond = self.evaluate(current, line_no, directive.rest)?;
                        top.active = cond;
                        top.taken = cond;
                    } else {
                        top.active = false;
                    }
                }
                "else" => {
                    let Some(top) = conditionals.last_mut() else {
                        return Err(self.directive_error(current, line_no, "#else without #if"));
                    };
                    if top.seen_else {
                        return Err(self.directive_error(current, line_no, "duplicate #else"));
                    }
                    top.active = top.parent_active && !top.taken;
                    top.taken = true;
                    top.seen_else = true;
                }
                "endif" => {
                    if conditionals.pop().is_none() {
                        return Err(self.directive_error(current, line_no, "#endif without #if"));
                    }
                }
                _ if !active => {}
                "include" => self.include(current, line_no, directive.rest, depth)?,
                "define" => {
                    let (name, rest) = leading_ident(directive.rest).ok_or_else(|| {
                        self.directive_error(current, line_no, "#define requires a macro name")
                    })?;

                    // Function-like macros only matter to `defined()` here
                    let value = if rest.starts_with('(') {
                        String::new()
                    } else {
                        strip_line_comment(rest).trim().to_owned()
                    };
                    self.acknowledge(&value);
                    self.defines.insert(name.to_owned(), value);
                    self.emit(&physical);
                }
                "undef" => {
                    if let Some((name, _)) = leading_ident(directive.rest) {
                        self.defines.remove(name);
                    }
                    self.emit(&physical);
                }
                "pragma" if is_pragma_once(&directive) => {}
                "version" => {
                    if self.version_line.is_none() {
                        self.version_line = Some(self.lines.len());
                    }
                    self.emit(&physical);
                }
                _ => {
                    self.acknowledge(&logical);
                    self.emit(&physical);
                }
            }
        }

        if !conditionals.is_empty() {
            return Err(self.directive_error(
                current,
                0,
                "conditional block is not terminated by #endif",
            ));
        }

        Ok(())
    }

    fn include(
        &mut self,
        current: &Path,
        line: usize,
        rest: &str,
        depth: u32,
    ) -> Result<(), PreprocessError> {
        let (name, kind) = parse_include_target(rest).ok_or_else(|| {
            self.directive_error(current, line, format!("malformed include `{rest}`"))
        })?;

        let resolved = self
            .preprocessor
            .resolver
            .resolve(name, kind, current.parent())
            .ok_or_else(|| PreprocessError::UnresolvedInclude {
                file: self.file.into(),
                stage: self.stage,
                include: name.into(),
                from: current.into(),
                line,
            })?;

        let text =
            io::read_text(&resolved.path).map_err(|source| PreprocessError::IncludeRead {
                file: self.file.into(),
                stage: self.stage,
                path: resolved.path.clone(),
                source,
            })?;

        let is_guarded = is_include_guarded(&text);
        self.metadata.insert_header(IncludeRecord {
            path: resolved.path.clone(),
            depth: depth + 1,
            is_relative: resolved.is_relative,
            is_guarded,
            hash: ContentHash::of(&text),
        });

        // Guarded headers are only expanded the first time they are seen
        if is_guarded && !self.guarded_seen.insert(resolved.path.clone()) {
            return Ok(());
        }

        if self.include_stack.contains(&resolved.path) {
            return Err(PreprocessError::RecursiveInclude {
                file: self.file.into(),
                stage: self.stage,
                include: resolved.path,
                from: current.into(),
                line,
            });
        }

        self.include_stack.push(resolved.path.clone());
        let result = self.process(
            &resolved.path,
            text.lines().enumerate().map(|(idx, line)| (idx + 1, line)),
            depth + 1,
        );
        self.include_stack.pop();
        result
    }

    fn evaluate(
        &mut self,
        current: &Path,
        line: usize,
        condition: &str,
    ) -> Result<bool, PreprocessError> {
        let condition = strip_line_comment(condition);
        self.acknowledge(condition);
        expr::evaluate(condition, &self.defines)
            .map(|value| value != 0)
            .map_err(|err| self.directive_error(current, line, err.to_string()))
    }

    /// Records references to global or engine-reserved macros.
    fn acknowledge(&mut self, text: &str) {
        let globals = &self.preprocessor.global_macros;
        for ident in identifiers(text) {
            if ident.starts_with(SPECIAL_MACRO_PREFIX) || globals.contains_key(ident) {
                self.acknowledged.insert(ident.to_owned());
            }
        }
    }

    #[inline]
    fn emit(&mut self, physical: &[&str]) {
        self.lines
            .extend(physical.iter().map(|line| (*line).to_owned()));
    }

    fn directive_error(
        &self,
        current: &Path,
        line: usize,
        message: impl Into<String>,
    ) -> PreprocessError {
        PreprocessError::Directive {
            file: self.file.into(),
            stage: self.stage,
            from: current.into(),
            line,
            message: message.into(),
        }
    }
}

fn define_line(name: &str, value: &str) -> String {
    if value.is_empty() {
        format!("#define {name}")
    } else {
        format!("#define {name} {value}")
    }
}
