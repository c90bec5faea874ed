use crate::background::PhotonField;
use crate::breaks::BreakCondition;
use crate::config::{InteractionConfig, RunConfig};
use crate::diagnostics::Span;
use crate::error::ConfigError;
use crate::interactions::ProcessKind;
use crate::kinematics::DispersionRelation;
use crate::observer::Observer;
use crate::particle::ParticleId;
use crate::propagator::Propagator;
use crate::source::{EnergyModel, PositionModel, Source, SpeciesModel};
use crate::units::{energy_unit, length_unit};
use glam::DVec3;
use thiserror::Error;

/// Parse error with optional span information
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{message}")]
    SyntaxError {
        message: String,
        span: Option<Span>,
    },
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self::SyntaxError {
            message: message.into(),
            span,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::SyntaxError {
            message: message.into(),
            span: None,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::SyntaxError { span, .. } => *span,
        }
    }
}

/// Helper to track byte offsets while parsing
struct ParseContext {
    line_offsets: Vec<usize>, // Byte offset of start of each line
}

impl ParseContext {
    fn new(source: &str) -> Self {
        let mut line_offsets = vec![0];
        let mut offset = 0;
        for ch in source.chars() {
            offset += ch.len_utf8();
            if ch == '\n' {
                line_offsets.push(offset);
            }
        }
        Self { line_offsets }
    }

    /// Get byte offset for start of line (0-indexed)
    fn line_start(&self, line: usize) -> usize {
        self.line_offsets.get(line).copied().unwrap_or(0)
    }

    /// Create a span for the entire line
    fn full_line_span(&self, line: usize, len: usize) -> Span {
        let start = self.line_start(line);
        Span::new(start, start + len)
    }
}

/// Whitespace-separated words of one declaration
struct Tokens<'a> {
    words: Vec<&'a str>,
    pos: usize,
    span: Option<Span>,
}

impl<'a> Tokens<'a> {
    fn new(line: &'a str, span: Option<Span>) -> Self {
        Self {
            words: line.split_whitespace().collect(),
            pos: 0,
            span,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.span)
    }

    fn peek(&self) -> Option<&'a str> {
        self.words.get(self.pos).copied()
    }

    fn next(&mut self, what: &str) -> Result<&'a str, ParseError> {
        let word = self
            .peek()
            .ok_or_else(|| self.error(format!("expected {what}")))?;
        self.pos += 1;
        Ok(word)
    }

    fn expect(&mut self, keyword: &str) -> Result<(), ParseError> {
        let word = self.next(&format!("'{keyword}'"))?;
        if word == keyword {
            Ok(())
        } else {
            Err(self.error(format!("expected '{keyword}', found '{word}'")))
        }
    }

    fn number(&mut self, what: &str) -> Result<f64, ParseError> {
        let word = self.next(what)?;
        word.parse::<f64>()
            .map_err(|_| self.error(format!("expected {what}, found '{word}'")))
    }

    fn integer(&mut self, what: &str) -> Result<u64, ParseError> {
        let word = self.next(what)?;
        word.parse::<u64>()
            .map_err(|_| self.error(format!("expected {what}, found '{word}'")))
    }

    /// A number followed by an energy unit, in eV
    fn energy(&mut self, what: &str) -> Result<f64, ParseError> {
        let value = self.number(what)?;
        Ok(value * self.energy_unit()?)
    }

    fn energy_unit(&mut self) -> Result<f64, ParseError> {
        let unit = self.next("an energy unit")?;
        energy_unit(unit).ok_or_else(|| self.error(format!("unknown energy unit '{unit}'")))
    }

    /// A number followed by a length unit, in metres
    fn length(&mut self, what: &str) -> Result<f64, ParseError> {
        let value = self.number(what)?;
        Ok(value * self.length_unit()?)
    }

    fn length_unit(&mut self) -> Result<f64, ParseError> {
        let unit = self.next("a length unit")?;
        length_unit(unit).ok_or_else(|| self.error(format!("unknown length unit '{unit}'")))
    }

    fn species(&mut self) -> Result<ParticleId, ParseError> {
        let word = self.next("a species")?;
        if word == "nucleus" {
            self.expect("A")?;
            let a = self.integer("mass number")?;
            self.expect("Z")?;
            let z = self.integer("charge number")?;
            return u32::try_from(a)
                .ok()
                .zip(u32::try_from(z).ok())
                .and_then(|(a, z)| ParticleId::nucleus(a, z))
                .ok_or_else(|| {
                    self.error(ConfigError::UnknownSpecies(format!("nucleus A {a} Z {z}")).to_string())
                });
        }
        let id = match word.parse::<i32>() {
            Ok(code) => Some(ParticleId(code)).filter(|id| id.is_known()),
            Err(_) => ParticleId::from_name(word),
        };
        id.ok_or_else(|| self.error(ConfigError::UnknownSpecies(word.to_string()).to_string()))
    }

    /// Fail if anything is left on the line
    fn finish(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(word) => Err(self.error(format!("unexpected '{word}'"))),
        }
    }
}

/// Source declarations are spread over several lines
#[derive(Default)]
struct SourceDraft {
    span: Option<Span>,
    position: Option<PositionModel>,
    direction: Option<DVec3>,
    redshift_from_position: bool,
    energy: Option<EnergyModel>,
    species: Option<SpeciesModel>,
}

impl SourceDraft {
    fn finish(self) -> Result<Option<Source>, ParseError> {
        if self.span.is_none() {
            return Ok(None);
        }
        let missing = |what: &str| {
            ParseError::new(format!("source is missing its {what} declaration"), self.span)
        };
        Ok(Some(Source {
            position: self.position.ok_or_else(|| missing("position"))?,
            direction: self.direction.unwrap_or(DVec3::NEG_X),
            redshift_from_position: self.redshift_from_position,
            energy: self.energy.ok_or_else(|| missing("energy"))?,
            species: self.species.ok_or_else(|| missing("species"))?,
        }))
    }
}

/// Parse a run script into a `RunConfig`
pub fn parse_script(source: &str) -> Result<RunConfig, ParseError> {
    let ctx = ParseContext::new(source);
    let mut config = RunConfig::default();
    let mut draft = SourceDraft::default();

    for (i, raw) in source.lines().enumerate() {
        let line = match raw.find('#') {
            Some(idx) => &raw[..idx],
            None => raw,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let span = Some(ctx.full_line_span(i, raw.len()));
        let mut tokens = Tokens::new(line, span);
        let keyword = tokens.next("a declaration")?;

        match keyword {
            "events" => config.events = tokens.integer("event count")?,
            "seed" => config.seed = tokens.integer("seed")?,
            "threads" => config.threads = tokens.integer("thread count")? as usize,
            "source" => {
                if draft.span.is_none() {
                    draft.span = span;
                }
                parse_source(&mut tokens, &mut draft)?;
            }
            "kinematics" => {
                let id = tokens.species()?;
                config.kinematics.add(id, parse_dispersion(&mut tokens)?);
            }
            "interaction" => config.interactions.push(parse_interaction(&mut tokens)?),
            "propagator" => {
                let min_step = tokens.length("minimum step")?;
                let max_step = tokens.length("maximum step")?;
                config.propagator = Some(Propagator { min_step, max_step });
            }
            "break" => config.breaks.push(parse_break(&mut tokens)?),
            "observer" => {
                tokens.expect("1d")?;
                let mut observer = Observer::default();
                if tokens.peek() == Some("keep_active") {
                    tokens.next("keep_active")?;
                    observer.deactivate_on_detection = false;
                }
                config.observer = Some(observer);
            }
            "output" => match tokens.next("an output option")? {
                "weights" => config.output.weights = true,
                "no_tags" => config.output.tags = false,
                "energy_scale" => config.output.energy_scale = tokens.energy_unit()?,
                "length_scale" => config.output.length_scale = tokens.length_unit()?,
                other => return Err(tokens.error(format!("unknown output option '{other}'"))),
            },
            other => return Err(tokens.error(format!("unknown declaration '{other}'"))),
        }
        tokens.finish()?;
    }

    config.source = draft.finish()?;
    Ok(config)
}

/// `source position|direction|redshift|energy|species ...`
fn parse_source(tokens: &mut Tokens<'_>, draft: &mut SourceDraft) -> Result<(), ParseError> {
    match tokens.next("a source property")? {
        "position" => {
            let model = match tokens.next("'fixed' or 'uniform'")? {
                "fixed" => PositionModel::Fixed {
                    distance: tokens.length("distance")?,
                },
                "uniform" => PositionModel::Uniform1D {
                    min: tokens.length("minimum distance")?,
                    max: tokens.length("maximum distance")?,
                },
                other => return Err(tokens.error(format!("unknown position model '{other}'"))),
            };
            draft.position = Some(model);
        }
        "direction" => {
            let x = tokens.number("direction x")?;
            let y = tokens.number("direction y")?;
            let z = tokens.number("direction z")?;
            draft.direction = Some(DVec3::new(x, y, z));
        }
        "redshift" => draft.redshift_from_position = true,
        "energy" => {
            let model = match tokens.next("'fixed' or 'power_law'")? {
                "fixed" => EnergyModel::Fixed {
                    energy: tokens.energy("energy")?,
                },
                "power_law" => {
                    let min = tokens.energy("minimum energy")?;
                    let max = tokens.energy("maximum energy")?;
                    tokens.expect("index")?;
                    let index = tokens.number("spectral index")?;
                    EnergyModel::PowerLaw { min, max, index }
                }
                other => return Err(tokens.error(format!("unknown energy model '{other}'"))),
            };
            draft.energy = Some(model);
        }
        "species" => {
            draft.species = Some(SpeciesModel::Fixed {
                id: tokens.species()?,
            });
        }
        other => return Err(tokens.error(format!("unknown source property '{other}'"))),
    }
    Ok(())
}

/// `liv order n coefficient c` or `special`
fn parse_dispersion(tokens: &mut Tokens<'_>) -> Result<DispersionRelation, ParseError> {
    match tokens.next("'liv' or 'special'")? {
        "special" => Ok(DispersionRelation::Special),
        "liv" => {
            tokens.expect("order")?;
            let order = tokens.integer("order")?;
            tokens.expect("coefficient")?;
            let coefficient = tokens.number("coefficient")?;
            Ok(DispersionRelation::LorentzViolating {
                order: order as u32,
                coefficient,
            })
        }
        other => Err(tokens.error(format!("unknown dispersion relation '{other}'"))),
    }
}

/// `<process> [field] [thinning f] [no_secondaries]`
fn parse_interaction(tokens: &mut Tokens<'_>) -> Result<InteractionConfig, ParseError> {
    let name = tokens.next("a process name")?;
    let process = ProcessKind::from_name(name)
        .ok_or_else(|| tokens.error(ConfigError::UnknownProcess(name.to_string()).to_string()))?;

    let mut config = InteractionConfig::new(process, None);
    if process.needs_field() {
        let field_name = tokens.next("a photon field")?;
        let field = PhotonField::from_name(field_name).ok_or_else(|| {
            tokens.error(ConfigError::UnknownBackground(field_name.to_string()).to_string())
        })?;
        config.field = Some(field);
    }

    while let Some(option) = tokens.peek() {
        tokens.next(option)?;
        match option {
            "thinning" => config.thinning = tokens.number("thinning factor")?,
            "no_secondaries" => config.secondaries = false,
            other => return Err(tokens.error(format!("unknown interaction option '{other}'"))),
        }
    }
    Ok(config)
}

/// `min_energy E`, `max_steps N` or `max_length L`
fn parse_break(tokens: &mut Tokens<'_>) -> Result<BreakCondition, ParseError> {
    match tokens.next("a break condition")? {
        "min_energy" => Ok(BreakCondition::MinimumEnergy {
            energy: tokens.energy("minimum energy")?,
        }),
        "max_steps" => Ok(BreakCondition::MaximumSteps {
            steps: tokens.integer("step count")?,
        }),
        "max_length" => Ok(BreakCondition::MaximumTrajectoryLength {
            length: tokens.length("trajectory length")?,
        }),
        other => Err(tokens.error(format!("unknown break condition '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{GEV, KPC, MPC, PEV};

    const GAMMA_SCRIPT: &str = "\
# gamma rays from a single distance
events 100
seed 7
source position fixed 590 Mpc
source energy power_law 1 GeV 1 PeV index -1
source species photon
interaction pair_production cmb thinning 0.1
interaction inverse_compton irb_gilmore12 no_secondaries
propagator 0.1 kpc 100 kpc
break min_energy 1 GeV
observer 1d
output weights
";

    #[test]
    fn test_parse_full_script() {
        let config = parse_script(GAMMA_SCRIPT).unwrap();
        assert_eq!(config.events, 100);
        assert_eq!(config.seed, 7);
        let source = config.source.unwrap();
        assert_eq!(source.position, PositionModel::Fixed { distance: 590.0 * MPC });
        assert_eq!(source.direction, DVec3::NEG_X);
        assert_eq!(
            source.energy,
            EnergyModel::PowerLaw {
                min: GEV,
                max: PEV,
                index: -1.0
            }
        );
        assert_eq!(config.interactions.len(), 2);
        assert_eq!(config.interactions[0].thinning, 0.1);
        assert!(!config.interactions[1].secondaries);
        assert_eq!(config.interactions[1].field, Some(PhotonField::IrbGilmore12));
        let prop = config.propagator.unwrap();
        assert!((prop.min_step - 0.1 * KPC).abs() / prop.min_step < 1e-12);
        assert_eq!(config.breaks, vec![BreakCondition::MinimumEnergy { energy: GEV }]);
        assert!(config.observer.unwrap().deactivate_on_detection);
        assert!(config.output.weights);
    }

    #[test]
    fn test_parse_nucleus_and_liv() {
        let script = "\
source position uniform 0 Mpc 1000 Mpc
source redshift
source energy fixed 100 EeV
source species nucleus A 56 Z 26
kinematics photon liv order 1 coefficient 10
";
        let config = parse_script(script).unwrap();
        let source = config.source.unwrap();
        assert!(source.redshift_from_position);
        assert_eq!(
            source.species,
            SpeciesModel::Fixed {
                id: ParticleId::nucleus(56, 26).unwrap()
            }
        );
        assert_eq!(
            config.kinematics.relation(ParticleId::PHOTON),
            DispersionRelation::LorentzViolating {
                order: 1,
                coefficient: 10.0
            }
        );
    }

    #[test]
    fn test_unknown_declaration_has_span() {
        let err = parse_script("events 3\nfrobnicate 1\n").unwrap_err();
        assert!(err.to_string().contains("frobnicate"));
        assert_eq!(err.span().unwrap().start, "events 3\n".len());
    }

    #[test]
    fn test_unknown_process_and_field() {
        let err = parse_script("interaction teleport cmb").unwrap_err();
        assert!(err.to_string().contains("teleport"));
        let err = parse_script("interaction pair_production moonlight").unwrap_err();
        assert!(err.to_string().contains("moonlight"));
    }

    #[test]
    fn test_bad_units_rejected() {
        assert!(parse_script("propagator 1 parsec 2 kpc").is_err());
        assert!(parse_script("break min_energy 1 joule").is_err());
    }

    #[test]
    fn test_incomplete_source_rejected() {
        let err = parse_script("source species photon\n").unwrap_err();
        assert!(err.to_string().contains("position"));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse_script("seed 3 4").is_err());
        assert!(parse_script("observer 1d forever").is_err());
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let config = parse_script("\n  # nothing\nevents 2 # two\n").unwrap();
        assert_eq!(config.events, 2);
        assert!(config.source.is_none());
    }
}
