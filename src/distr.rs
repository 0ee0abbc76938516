//! Distributions to draw branch lengths of generated trees
//!

use std::fmt::{Debug, Display};

use clap::ValueEnum;
use num_traits::{Float, Zero};
use numeric_literals::replace_numeric_literals;
use rand_distr::{uniform::SampleUniform, Distribution, Exp, ExpError, Gamma, GammaError, Uniform};
use thiserror::Error;
use trait_set::trait_set;

trait_set! {
    /// Trait describing objects that can be used as branch lengths
    /// in phylogenetic trees.
    pub trait BranchLength = Debug + Display + Float + Zero + SampleUniform;
}

/// Errors that can occur when setting up a branch length distribution
#[derive(Error, Debug)]
pub enum DistrError {
    /// A parameter could not be represented in the branch length type
    #[error("Distribution parameter cannot be represented")]
    Parameter,
    /// The parameters of the exponential distribution are invalid
    #[error("Invalid exponential distribution: {0}")]
    Exponential(#[from] ExpError),
    /// The parameters of the gamma distribution are invalid
    #[error("Invalid gamma distribution: {0}")]
    Gamma(#[from] GammaError),
}

/// Available branch length distributions
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default, ValueEnum)]
pub enum Distr {
    /// A [uniform](https://en.wikipedia.org/wiki/Continuous_uniform_distribution)
    /// distribution over $[0.002, 1.0)$
    #[default]
    Uniform,
    /// An [exponential](https://en.wikipedia.org/wiki/Exponential_distribution)
    /// distribution with rate $\lambda=0.15$
    Exponential,
    /// A [gamma](https://en.wikipedia.org/wiki/Gamma_distribution) distribution
    /// with a shape $k=4$ and scale $\theta=1.0$.
    Gamma,
}

/// Sampler for one of the [`Distr`] distributions
pub enum Sampler<T>
where
    T: BranchLength,
    rand_distr::StandardNormal: rand_distr::Distribution<T>,
    rand_distr::Exp1: rand_distr::Distribution<T>,
    rand_distr::Open01: rand_distr::Distribution<T>,
{
    /// Uniform sampler
    Uniform(Uniform<T>),
    /// Exponential sampler
    Exponential(Exp<T>),
    /// Gamma sampler
    Gamma(Gamma<T>),
}

impl<T> Sampler<T>
where
    T: BranchLength,
    rand_distr::StandardNormal: rand_distr::Distribution<T>,
    rand_distr::Exp1: rand_distr::Distribution<T>,
    rand_distr::Open01: rand_distr::Distribution<T>,
{
    /// Sets up the sampler of a distribution
    /// ```
    /// use ntree::distr::{Distr, Sampler};
    /// use rand::SeedableRng;
    /// use rand_distr::Distribution;
    ///
    /// let sampler = Sampler::<f64>::new(Distr::Uniform).unwrap();
    /// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    /// let length = sampler.sample(&mut rng);
    ///
    /// assert!((0.002..1.0).contains(&length));
    /// ```
    #[replace_numeric_literals(T::from(literal).ok_or(DistrError::Parameter)?)]
    pub fn new(v: Distr) -> Result<Self, DistrError> {
        let sampler = match v {
            Distr::Uniform => Self::Uniform(Uniform::<T>::new(0.002, 1.0)),
            Distr::Exponential => Self::Exponential(Exp::new(0.15)?),
            Distr::Gamma => Self::Gamma(Gamma::new(4.0, 1.0)?),
        };
        Ok(sampler)
    }
}

impl<T> Distribution<T> for Sampler<T>
where
    T: BranchLength,
    rand_distr::StandardNormal: rand_distr::Distribution<T>,
    rand_distr::Exp1: rand_distr::Distribution<T>,
    rand_distr::Open01: rand_distr::Distribution<T>,
{
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> T {
        match self {
            Sampler::Uniform(u) => u.sample(rng),
            Sampler::Exponential(e) => e.sample(rng),
            Sampler::Gamma(p) => p.sample(rng),
        }
    }
}
