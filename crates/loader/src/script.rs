//! Line-oriented scenario scripts (`.cells`).
//!
//! ```text
//! # two cells and a wall
//! world seed 42
//! world size 200 200 40
//! world time_step 0.5
//! create barrier at 0 -20 0 width=200 height=2 depth=40
//! create yeast at 0 0 0 volume=40
//! repeat 3 create yeast at ${i}0 10 0 velocity 0 -1 0
//! module object-generator of yeast probability=0.1
//! ```
//!
//! `world` lines must precede the first object or module. `${name}` expands
//! a scenario parameter; inside `repeat` the index of the innermost loop is
//! available as `${i}`.

use crate::error::SourceError;
use crate::factory::{BuildEnv, WorldFactory, substitute};
use cellsim_kernel::{ModuleArgs, ObjectArgs, World, WorldSettings};
use glam::{EulerRot, Quat, Vec3};
use std::collections::BTreeMap;

/// Upper bound on the commands one `repeat` line expands to, nested loops
/// included. Guards against typos like `repeat 1e9`.
const MAX_REPEAT: u64 = 100_000;

/// A parsed script: world settings plus objects in creation order and the
/// world modules to install.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub settings: WorldSettings,
    pub objects: Vec<ScriptObject>,
    pub modules: Vec<ScriptModule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptObject {
    /// 1-based source line.
    pub line: usize,
    pub kind: String,
    pub args: ObjectArgs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptModule {
    pub line: usize,
    pub name: String,
    pub args: ModuleArgs,
}

impl Script {
    pub fn parse(source: &str, parameters: &BTreeMap<String, String>) -> Result<Self, SourceError> {
        let mut script = Self::default();
        let lookup = |name: &str| parameters.get(name).cloned();
        for (index, raw) in source.lines().enumerate() {
            let text = raw.split('#').next().unwrap_or_default().trim();
            if !text.is_empty() {
                script.parse_line(index + 1, text, &lookup, 1)?;
            }
        }
        Ok(script)
    }

    /// `enclosing` is the number of times the surrounding loops run this
    /// line, 1 outside any loop.
    fn parse_line(
        &mut self,
        line: usize,
        text: &str,
        lookup: &dyn Fn(&str) -> Option<String>,
        enclosing: u64,
    ) -> Result<(), SourceError> {
        let (head, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        if head == "repeat" {
            return self.parse_repeat(line, rest.trim(), lookup, enclosing);
        }
        let expanded = substitute(text, lookup).map_err(|e| SourceError::script(line, e.to_string()))?;
        let mut tokens = Tokens::new(line, &expanded);
        match tokens.word()? {
            "world" => {
                if !self.objects.is_empty() || !self.modules.is_empty() {
                    return Err(SourceError::script(
                        line,
                        "world settings must come before the first object or module",
                    ));
                }
                self.parse_world(&mut tokens)?;
            }
            "create" => {
                let object = parse_create(&mut tokens)?;
                self.objects.push(object);
            }
            "module" => {
                let module = parse_module(&mut tokens)?;
                self.modules.push(module);
            }
            other => return Err(SourceError::script(line, format!("unknown command `{other}`"))),
        }
        tokens.finish()
    }

    fn parse_repeat(
        &mut self,
        line: usize,
        rest: &str,
        lookup: &dyn Fn(&str) -> Option<String>,
        enclosing: u64,
    ) -> Result<(), SourceError> {
        let (count, body) = rest
            .split_once(char::is_whitespace)
            .ok_or_else(|| SourceError::script(line, "usage: repeat <count> <command>"))?;
        let count = substitute(count, lookup).map_err(|e| SourceError::script(line, e.to_string()))?;
        let count: u64 = count
            .parse()
            .map_err(|_| SourceError::script(line, format!("invalid repeat count `{count}`")))?;
        let total = enclosing.saturating_mul(count);
        if total > MAX_REPEAT {
            return Err(SourceError::script(
                line,
                format!("repeat expands to {total} commands, more than {MAX_REPEAT}"),
            ));
        }
        // The body is expanded by the line it holds, so a nested loop sees its
        // own index as `${i}`.
        for i in 0..count {
            let scoped = |name: &str| match name {
                "i" => Some(i.to_string()),
                _ => lookup(name),
            };
            self.parse_line(line, body.trim(), &scoped, total)?;
        }
        Ok(())
    }

    fn parse_world(&mut self, tokens: &mut Tokens<'_>) -> Result<(), SourceError> {
        match tokens.word()? {
            "size" => self.settings.size = tokens.vec3()?,
            "seed" => self.settings.seed = tokens.integer()?,
            "time_step" => self.settings.time_step = Some(tokens.number()?),
            "iterations" => self.settings.iterations = Some(tokens.integer()?),
            other => return Err(tokens.error(format!("unknown world setting `{other}`"))),
        }
        Ok(())
    }

    pub fn build(&self, env: &BuildEnv) -> Result<World, SourceError> {
        let mut world = env.new_world(self.settings.clone());
        for object in &self.objects {
            world
                .create_object(&object.kind, &object.args)
                .map_err(|source| SourceError::Object {
                    context: format!("line {}", object.line),
                    source,
                })?;
        }
        for module in &self.modules {
            world
                .create_module(&module.name, &module.args)
                .map_err(|source| SourceError::Object {
                    context: format!("line {}", module.line),
                    source,
                })?;
        }
        Ok(world)
    }
}

fn parse_create(tokens: &mut Tokens<'_>) -> Result<ScriptObject, SourceError> {
    let kind = tokens.word()?.to_string();
    tokens.expect("at")?;
    let mut args = ObjectArgs::at(tokens.vec3()?);
    while let Some(token) = tokens.next() {
        match token {
            "velocity" => args.velocity = tokens.vec3()?,
            "rotation" => {
                let deg = tokens.vec3()?;
                args.transform.rotation = Quat::from_euler(
                    EulerRot::XYZ,
                    deg.x.to_radians(),
                    deg.y.to_radians(),
                    deg.z.to_radians(),
                );
            }
            param => parse_param(tokens, param, &mut args.params)?,
        }
    }
    Ok(ScriptObject {
        line: tokens.line,
        kind,
        args,
    })
}

/// `module <name> [of <kind>] [name=value ...]`
fn parse_module(tokens: &mut Tokens<'_>) -> Result<ScriptModule, SourceError> {
    let name = tokens.word()?.to_string();
    let mut args = ModuleArgs::default();
    while let Some(token) = tokens.next() {
        match token {
            "of" if args.object_kind.is_none() => args.object_kind = Some(tokens.word()?.to_string()),
            param => parse_param(tokens, param, &mut args.params)?,
        }
    }
    Ok(ScriptModule {
        line: tokens.line,
        name,
        args,
    })
}

fn parse_param(tokens: &Tokens<'_>, param: &str, params: &mut BTreeMap<String, f64>) -> Result<(), SourceError> {
    let (name, value) = param
        .split_once('=')
        .ok_or_else(|| tokens.error(format!("unexpected `{param}`")))?;
    let value: f64 = value
        .parse()
        .map_err(|_| tokens.error(format!("parameter `{name}` needs a number, got `{value}`")))?;
    params.insert(name.to_string(), value);
    Ok(())
}

/// Whitespace tokenizer that remembers its line for error messages.
struct Tokens<'a> {
    line: usize,
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(line: usize, text: &'a str) -> Self {
        Self {
            line,
            inner: text.split_whitespace(),
        }
    }

    fn error(&self, message: impl Into<String>) -> SourceError {
        SourceError::script(self.line, message)
    }

    fn next(&mut self) -> Option<&'a str> {
        self.inner.next()
    }

    fn word(&mut self) -> Result<&'a str, SourceError> {
        self.next().ok_or_else(|| self.error("unexpected end of line"))
    }

    fn expect(&mut self, keyword: &str) -> Result<(), SourceError> {
        match self.word()? {
            word if word == keyword => Ok(()),
            word => Err(self.error(format!("expected `{keyword}`, got `{word}`"))),
        }
    }

    fn number(&mut self) -> Result<f32, SourceError> {
        let word = self.word()?;
        word.parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.error(format!("expected a number, got `{word}`")))
    }

    fn integer(&mut self) -> Result<u64, SourceError> {
        let word = self.word()?;
        word.parse()
            .map_err(|_| self.error(format!("expected a whole number, got `{word}`")))
    }

    fn vec3(&mut self) -> Result<Vec3, SourceError> {
        Ok(Vec3::new(self.number()?, self.number()?, self.number()?))
    }

    fn finish(mut self) -> Result<(), SourceError> {
        match self.next() {
            Some(extra) => Err(self.error(format!("unexpected `{extra}`"))),
            None => Ok(()),
        }
    }
}

/// The `script` backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptFactory;

impl WorldFactory for ScriptFactory {
    fn name(&self) -> &str {
        "script"
    }

    fn extensions(&self) -> &[&str] {
        &["cells"]
    }

    fn create_world_from_source(&self, source: &str, env: &BuildEnv) -> Result<World, SourceError> {
        let script = Script::parse(source, &env.parameters)?;
        let world = script.build(env)?;
        tracing::debug!(objects = world.object_count(), modules = world.module_count(), "script built");
        Ok(world)
    }
}
