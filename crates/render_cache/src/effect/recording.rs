//! Headless effect that records parameter writes and pass boundaries

use std::any::Any;
use std::collections::HashSet;

use super::{Effect, ParameterHandle};
use crate::device::TextureHandle;
use crate::error::{DeviceError, DeviceResult};

/// One recorded effect call
#[derive(Debug, Clone, PartialEq)]
pub enum EffectCall {
    /// Texture parameter written
    SetTexture(ParameterHandle, Option<TextureHandle>),
    /// Vector parameter written
    SetVector(ParameterHandle, [f32; 4]),
    /// Scalar parameter written
    SetFloat(ParameterHandle, f32),
    /// Parameter changes committed
    CommitChanges,
    /// Effect started
    Begin,
    /// Pass started
    BeginPass(usize),
    /// Pass finished
    EndPass,
    /// Effect finished
    End,
}

#[derive(Debug, Clone, PartialEq)]
enum ParameterValue {
    Unset,
    Texture(Option<TextureHandle>),
    Vector([f32; 4]),
    Float(f32),
}

/// [`Effect`] with a fixed pass count and named parameters
///
/// Parameter handles are the position of the name in the list given to
/// [`RecordingEffect::new`].
#[derive(Debug)]
pub struct RecordingEffect {
    name: String,
    passes: usize,
    parameters: Vec<(String, ParameterValue)>,
    calls: Vec<EffectCall>,
    pending_failures: HashSet<&'static str>,
    active_pass: Option<usize>,
    begun: bool,
}

impl RecordingEffect {
    /// Create an effect with `passes` passes declaring `parameters`
    pub fn new(name: &str, passes: usize, parameters: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            passes,
            parameters: parameters
                .iter()
                .map(|parameter| (parameter.to_string(), ParameterValue::Unset))
                .collect(),
            calls: Vec::new(),
            pending_failures: HashSet::new(),
            active_pass: None,
            begun: false,
        }
    }

    /// Make the next call of `operation` fail once
    pub fn fail_next(&mut self, operation: &'static str) {
        self.pending_failures.insert(operation);
    }

    /// Every call recorded so far
    pub fn calls(&self) -> &[EffectCall] {
        &self.calls
    }

    /// Clear the call log
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of passes begun so far
    pub fn passes_begun(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, EffectCall::BeginPass(_)))
            .count()
    }

    /// Last texture written to `name`; `None` if never written or undeclared
    pub fn texture(&self, name: &str) -> Option<Option<TextureHandle>> {
        match self.value(name)? {
            ParameterValue::Texture(texture) => Some(*texture),
            _ => None,
        }
    }

    /// Last vector written to `name`
    pub fn vector(&self, name: &str) -> Option<[f32; 4]> {
        match self.value(name)? {
            ParameterValue::Vector(value) => Some(*value),
            _ => None,
        }
    }

    /// Last scalar written to `name`
    pub fn float(&self, name: &str) -> Option<f32> {
        match self.value(name)? {
            ParameterValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    fn value(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters
            .iter()
            .find(|(parameter, _)| parameter == name)
            .map(|(_, value)| value)
    }

    fn check(&mut self, operation: &'static str) -> DeviceResult<()> {
        if self.pending_failures.remove(operation) {
            log::debug!("RecordingEffect '{}': injected failure for `{}`", self.name, operation);
            Err(DeviceError::new(operation, "injected failure"))
        } else {
            Ok(())
        }
    }

    fn store(&mut self, operation: &'static str, parameter: ParameterHandle, value: ParameterValue) -> DeviceResult<()> {
        self.check(operation)?;
        let slot = self
            .parameters
            .get_mut(parameter.0 as usize)
            .ok_or_else(|| DeviceError::new(operation, format!("unknown parameter {:?}", parameter)))?;
        slot.1 = value;
        Ok(())
    }
}

impl Effect for RecordingEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter(&self, name: &str) -> Option<ParameterHandle> {
        self.parameters
            .iter()
            .position(|(parameter, _)| parameter == name)
            .map(|index| ParameterHandle(index as u32))
    }

    fn set_texture(&mut self, parameter: ParameterHandle, texture: Option<TextureHandle>) -> DeviceResult<()> {
        self.store("set_texture", parameter, ParameterValue::Texture(texture))?;
        self.calls.push(EffectCall::SetTexture(parameter, texture));
        Ok(())
    }

    fn set_vector(&mut self, parameter: ParameterHandle, value: [f32; 4]) -> DeviceResult<()> {
        self.store("set_vector", parameter, ParameterValue::Vector(value))?;
        self.calls.push(EffectCall::SetVector(parameter, value));
        Ok(())
    }

    fn set_float(&mut self, parameter: ParameterHandle, value: f32) -> DeviceResult<()> {
        self.store("set_float", parameter, ParameterValue::Float(value))?;
        self.calls.push(EffectCall::SetFloat(parameter, value));
        Ok(())
    }

    fn commit_changes(&mut self) -> DeviceResult<()> {
        self.check("commit_changes")?;
        self.calls.push(EffectCall::CommitChanges);
        Ok(())
    }

    fn begin(&mut self) -> DeviceResult<usize> {
        self.check("begin")?;
        if self.begun {
            return Err(DeviceError::new("begin", "effect already begun"));
        }
        self.begun = true;
        self.calls.push(EffectCall::Begin);
        Ok(self.passes)
    }

    fn begin_pass(&mut self, pass: usize) -> DeviceResult<()> {
        self.check("begin_pass")?;
        if !self.begun || self.active_pass.is_some() {
            return Err(DeviceError::new("begin_pass", "pass started outside begin/end"));
        }
        if pass >= self.passes {
            return Err(DeviceError::new(
                "begin_pass",
                format!("pass {} of {}", pass, self.passes),
            ));
        }
        self.active_pass = Some(pass);
        self.calls.push(EffectCall::BeginPass(pass));
        Ok(())
    }

    fn end_pass(&mut self) -> DeviceResult<()> {
        self.check("end_pass")?;
        if self.active_pass.take().is_none() {
            return Err(DeviceError::new("end_pass", "no active pass"));
        }
        self.calls.push(EffectCall::EndPass);
        Ok(())
    }

    fn end(&mut self) -> DeviceResult<()> {
        self.check("end")?;
        if !self.begun {
            return Err(DeviceError::new("end", "effect not begun"));
        }
        self.begun = false;
        self.active_pass = None;
        self.calls.push(EffectCall::End);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
