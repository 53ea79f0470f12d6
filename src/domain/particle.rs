/// Cosmetic particles: unicorn trails, invincibility sparks, score popups.
///
/// Presentation only. Nothing here feeds back into movement or AI, but
/// spark angles come from the session RNG so replays stay identical.

use std::f32::consts::TAU;

use super::rng::SimRng;

pub const TRAIL_LIFE: f32 = 0.35;
pub const SPARK_LIFE: f32 = 0.45;
pub const SPARKS_PER_TICK: usize = 2;
pub const SPARK_SPEED: (f32, f32) = (60.0, 140.0);
pub const FLOAT_TEXT_LIFE: f32 = 0.8;
pub const FLOAT_TEXT_RISE: f32 = 30.0; // px/s

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParticleKind {
    Trail,
    Spark,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub kind: ParticleKind,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub life: f32,
    pub max_life: f32,
    pub hue: f32, // degrees
}

impl Particle {
    /// 1.0 when fresh, falling to 0.0 at expiry.
    pub fn fade(&self) -> f32 {
        if self.max_life <= 0.0 { 0.0 } else { (self.life / self.max_life).clamp(0.0, 1.0) }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FloatText {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub life: f32,
}

#[derive(Clone, Debug, Default)]
pub struct Particles {
    pub particles: Vec<Particle>,
    pub texts: Vec<FloatText>,
}

impl Particles {
    pub fn trail(&mut self, x: f32, y: f32, clock: f32) {
        self.particles.push(Particle {
            kind: ParticleKind::Trail,
            x, y,
            vx: 0.0,
            vy: 0.0,
            life: TRAIL_LIFE,
            max_life: TRAIL_LIFE,
            hue: (clock * 125.0) % 360.0,
        });
    }

    pub fn sparks(&mut self, x: f32, y: f32, clock: f32, rng: &mut SimRng) {
        for _ in 0..SPARKS_PER_TICK {
            let angle = rng.next_f32() * TAU;
            let speed = rng.range_f32(SPARK_SPEED.0, SPARK_SPEED.1);
            let hue = (clock * 200.0 + rng.next_f32() * 40.0) % 360.0;
            self.particles.push(Particle {
                kind: ParticleKind::Spark,
                x, y,
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                life: SPARK_LIFE,
                max_life: SPARK_LIFE,
                hue,
            });
        }
    }

    pub fn popup(&mut self, x: f32, y: f32, text: impl Into<String>) {
        self.texts.push(FloatText { x, y, text: text.into(), life: FLOAT_TEXT_LIFE });
    }

    /// Age everything by `dt`: sparks drift, texts rise, the expired go.
    pub fn update(&mut self, dt: f32) {
        for p in &mut self.particles {
            p.life -= dt;
            p.x += p.vx * dt;
            p.y += p.vy * dt;
        }
        self.particles.retain(|p| p.life > 0.0);

        for t in &mut self.texts {
            t.life -= dt;
            t.y -= FLOAT_TEXT_RISE * dt;
        }
        self.texts.retain(|t| t.life > 0.0);
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.texts.clear();
    }
}
