use rand::distributions::Uniform;
use rand::Rng;
use rand_distr::{Distribution, Exp, Normal};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Distribution family, selected by the law code of [`Stochastic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Law {
    Uniform,
    Normal,
    Exponential,
}

impl TryFrom<u8> for Law {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Law::Uniform),
            1 => Ok(Law::Normal),
            2 => Ok(Law::Exponential),
            other => Err(ConfigError::UnknownLaw(other)),
        }
    }
}

/// Size model of a request attribute: `law` 0 rectangular, 1 normal,
/// 2 exponential, with location/scale parameters.
///
/// - rectangular: uniform on `[location, location + scale]`
/// - normal: mean `location`, standard deviation `scale`
/// - exponential: `location` plus an exponential draw with mean `scale`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stochastic {
    pub law: u8,
    pub location: f64,
    pub scale: f64,
}

impl Stochastic {
    pub fn new(law: u8, location: f64, scale: f64) -> Self {
        Stochastic { law, location, scale }
    }

    pub fn validate(&self) -> Result<Law, ConfigError> {
        let law = Law::try_from(self.law)?;
        if !(self.scale.is_finite() && self.scale >= 0.0) {
            return Err(ConfigError::InvalidScale(self.scale));
        }
        if !self.location.is_finite() {
            return Err(ConfigError::InvalidLocation(self.location));
        }
        Ok(law)
    }

    pub fn sampler(&self) -> Result<Sampler, ConfigError> {
        let law = self.validate()?;
        if self.scale == 0.0 {
            return Ok(Sampler::Constant(self.location));
        }
        let sampler = match law {
            Law::Uniform => {
                Sampler::Uniform(Uniform::new_inclusive(self.location, self.location + self.scale))
            }
            Law::Normal => Sampler::Normal(
                Normal::new(self.location, self.scale).map_err(|_| ConfigError::InvalidScale(self.scale))?,
            ),
            Law::Exponential => Sampler::Exponential(
                self.location,
                Exp::new(1.0 / self.scale).map_err(|_| ConfigError::InvalidScale(self.scale))?,
            ),
        };
        Ok(sampler)
    }
}

/// Validated, ready to draw form of [`Stochastic`].
#[derive(Debug, Clone, Copy)]
pub enum Sampler {
    Constant(f64),
    Uniform(Uniform<f64>),
    Normal(Normal<f64>),
    Exponential(f64, Exp<f64>),
}

impl Sampler {
    /// Draws one value rounded to an integer unit. Negative draws clamp to zero.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let value = match self {
            Sampler::Constant(value) => *value,
            Sampler::Uniform(dist) => dist.sample(rng),
            Sampler::Normal(dist) => dist.sample(rng),
            Sampler::Exponential(location, dist) => location + dist.sample(rng),
        };
        value.round().max(0.0) as u64
    }
}
