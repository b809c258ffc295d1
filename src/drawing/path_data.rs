//! SVG path data to absolute polylines.
//!
//! Curves and arcs are reduced to their end points: the traces we care about
//! are polylines, and for the occasional curve the end point is the sample
//! that survives normalization anyway.

use glam::{DVec2, dvec2};
use pest::Parser;
use pest::iterators::{Pair, Pairs};

use super::grammar::{Rule, SvgAttrParser, SyntaxError, number, point};

/// One subpath in user space (transforms not yet applied)
#[derive(Debug, Clone, PartialEq)]
pub struct Subpath {
    pub points: Vec<DVec2>,
    pub closed: bool,
}

/// Parse a `d` attribute into subpaths with absolute coordinates.
///
/// Subpaths with fewer than two points (a lone moveto) draw nothing and are
/// dropped.
pub fn parse_path_data(d: &str) -> Result<Vec<Subpath>, SyntaxError> {
    let mut pen = Pen::default();
    for top in SvgAttrParser::parse(Rule::path_data, d)? {
        for command in top.into_inner() {
            if command.as_rule() == Rule::command {
                pen.apply(command)?;
            }
        }
    }
    Ok(pen.finish())
}

/// Parse a `points` attribute (polyline / polygon)
pub fn parse_point_list(points: &str) -> Result<Vec<DVec2>, SyntaxError> {
    let mut out = Vec::new();
    for top in SvgAttrParser::parse(Rule::point_list, points)? {
        for pair in top.into_inner() {
            if pair.as_rule() == Rule::pair {
                out.push(point(pair)?);
            }
        }
    }
    Ok(out)
}

#[derive(Default)]
struct Pen {
    current: DVec2,
    subpath_start: DVec2,
    open: Vec<DVec2>,
    done: Vec<Subpath>,
}

impl Pen {
    fn apply(&mut self, command: Pair<Rule>) -> Result<(), SyntaxError> {
        let Some(cmd) = command.into_inner().next() else {
            return Ok(());
        };
        let rule = cmd.as_rule();
        if rule == Rule::closepath {
            self.close();
            return Ok(());
        }

        let mut parts = cmd.into_inner();
        let Some(op) = parts.next() else {
            return Ok(());
        };
        let letter = op.as_str().chars().next().unwrap_or('?');
        let relative = letter.is_ascii_lowercase();

        match rule {
            Rule::moveto => {
                for (i, p) in points(parts)?.into_iter().enumerate() {
                    let target = self.resolve(p, relative);
                    if i == 0 {
                        self.move_to(target);
                    } else {
                        // Extra pairs after a moveto are implicit linetos
                        self.line_to(target);
                    }
                }
            }
            Rule::lineto => {
                for p in points(parts)? {
                    let target = self.resolve(p, relative);
                    self.line_to(target);
                }
            }
            Rule::hline => {
                for n in parts {
                    let x = number(n)?;
                    let x = if relative { self.current.x + x } else { x };
                    self.line_to(dvec2(x, self.current.y));
                }
            }
            Rule::vline => {
                for n in parts {
                    let y = number(n)?;
                    let y = if relative { self.current.y + y } else { y };
                    self.line_to(dvec2(self.current.x, y));
                }
            }
            Rule::curveto => self.curve(letter, points(parts)?, 3, relative)?,
            Rule::smooth_curveto | Rule::quadratic => {
                self.curve(letter, points(parts)?, 2, relative)?
            }
            Rule::smooth_quadratic => self.curve(letter, points(parts)?, 1, relative)?,
            Rule::arc => {
                for args in parts {
                    let Some(end) = args.into_inner().last() else {
                        continue;
                    };
                    let target = self.resolve(point(end)?, relative);
                    self.line_to(target);
                }
            }
            _ => unreachable!("command rule {rule:?}"),
        }
        Ok(())
    }

    /// Each group of `arity` pairs ends at its last pair
    fn curve(
        &mut self,
        letter: char,
        pts: Vec<DVec2>,
        arity: usize,
        relative: bool,
    ) -> Result<(), SyntaxError> {
        if pts.len() % arity != 0 {
            return Err(SyntaxError::ArgumentCount {
                command: letter,
                arity: arity * 2,
                count: pts.len() * 2,
            });
        }
        for group in pts.chunks(arity) {
            let target = self.resolve(group[arity - 1], relative);
            self.line_to(target);
        }
        Ok(())
    }

    fn resolve(&self, p: DVec2, relative: bool) -> DVec2 {
        if relative { self.current + p } else { p }
    }

    fn move_to(&mut self, p: DVec2) {
        self.flush(false);
        self.open.push(p);
        self.current = p;
        self.subpath_start = p;
    }

    fn line_to(&mut self, p: DVec2) {
        if self.open.is_empty() {
            self.open.push(self.current);
        }
        self.open.push(p);
        self.current = p;
    }

    fn close(&mut self) {
        self.flush(true);
        self.current = self.subpath_start;
    }

    fn flush(&mut self, closed: bool) {
        let points = std::mem::take(&mut self.open);
        if points.len() >= 2 {
            self.done.push(Subpath { points, closed });
        }
    }

    fn finish(mut self) -> Vec<Subpath> {
        self.flush(false);
        self.done
    }
}

fn points(parts: Pairs<Rule>) -> Result<Vec<DVec2>, SyntaxError> {
    parts.map(point).collect()
}
