use std::path::Path;

use crate::error::Result;
use crate::train::{Metric, TrainingHistory};

const PANEL_W: f64 = 420.0;
const PANEL_H: f64 = 240.0;
const PAD_L: f64 = 56.0;
const PAD_R: f64 = 16.0;
const PAD_T: f64 = 28.0;
const PAD_B: f64 = 30.0;

const TRAIN_COLOR: &str = "#dc2626";
const VAL_COLOR: &str = "#16a34a";
const BEST_COLOR: &str = "#1e40af";
const GRID_COLOR: &str = "#f0f2f5";
const AXIS_TEXT: &str = "#999";
const DARK_TEXT: &str = "#333";

/// Renders the 2×2 grid of loss / accuracy / precision / recall curves
/// (train solid, validation dashed) with the best validation epoch of each
/// metric marked.
pub fn training_chart_svg(history: &TrainingHistory) -> String {
    let panels: String = Metric::ALL
        .iter()
        .enumerate()
        .map(|(i, &metric)| {
            let dx = (i % 2) as f64 * PANEL_W;
            let dy = (i / 2) as f64 * PANEL_H;
            format!(
                "<g transform=\"translate({:.0},{:.0})\">\n{}\n</g>",
                dx,
                dy,
                metric_panel(history, metric)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "<svg class=\"history-svg\" width=\"{:.0}\" height=\"{:.0}\" xmlns=\"http://www.w3.org/2000/svg\" \
         font-family=\"sans-serif\">\n<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n{}\n</svg>\n",
        PANEL_W * 2.0,
        PANEL_H * 2.0,
        panels
    )
}

pub fn save_training_chart(history: &TrainingHistory, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, training_chart_svg(history))?;
    Ok(())
}

fn metric_panel(history: &TrainingHistory, metric: Metric) -> String {
    let train = history.series(metric, false);
    let val = history.series(metric, true);
    let title = format!(
        "<text x=\"{:.1}\" y=\"16\" fill=\"{}\" font-size=\"13\" font-weight=\"bold\">{}</text>",
        PAD_L,
        DARK_TEXT,
        metric
    );
    if train.is_empty() {
        return format!(
            "{}\n<text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"11\">no epochs recorded</text>",
            title,
            PAD_L,
            PANEL_H / 2.0,
            AXIS_TEXT
        );
    }

    let n = history.epochs.len().max(2);
    let values = train.iter().chain(val.iter()).map(|&(_, v)| v);
    let (mut min_y, mut max_y) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if metric.lower_is_better() {
        min_y = 0.0;
        max_y *= 1.05;
    } else {
        min_y = (min_y - 0.05).max(0.0);
        max_y = (max_y + 0.05).min(1.0);
    }
    if max_y - min_y < 1e-9 {
        max_y = min_y + 1.0;
    }

    let px = |epoch: usize, v: f64| -> (f64, f64) {
        let x = PAD_L + ((epoch - 1) as f64 / (n - 1) as f64) * (PANEL_W - PAD_L - PAD_R);
        let y = PAD_T + (max_y - v) / (max_y - min_y) * (PANEL_H - PAD_T - PAD_B);
        (x, y)
    };

    let path = |points: &[(usize, f64)]| -> String {
        points
            .iter()
            .enumerate()
            .map(|(i, &(epoch, v))| {
                let (x, y) = px(epoch, v);
                if i == 0 { format!("M{:.1},{:.1}", x, y) } else { format!(" L{:.1},{:.1}", x, y) }
            })
            .collect()
    };

    let y_labels: String = (0..=4)
        .map(|g| {
            let frac = g as f64 / 4.0;
            let value = min_y + (max_y - min_y) * frac;
            let y = PAD_T + (1.0 - frac) * (PANEL_H - PAD_T - PAD_B);
            format!(
                "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" fill=\"{}\" font-size=\"10\">{:.3}</text>\n\
                 <line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"1\"/>",
                PAD_L - 4.0,
                y + 4.0,
                AXIS_TEXT,
                value,
                PAD_L,
                y,
                PANEL_W - PAD_R,
                y,
                GRID_COLOR
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let x_labels: String = history
        .epochs
        .iter()
        .map(|e| {
            let (x, _) = px(e.epoch, min_y);
            format!(
                "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" fill=\"{}\" font-size=\"10\">{}</text>",
                x,
                PANEL_H - 12.0,
                AXIS_TEXT,
                e.epoch
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut body = format!(
        "{}\n{}\n{}\n<path d=\"{}\" stroke=\"{}\" stroke-width=\"2\" fill=\"none\"/>",
        title,
        y_labels,
        x_labels,
        path(&train),
        TRAIN_COLOR
    );
    if !val.is_empty() {
        body.push_str(&format!(
            "\n<path d=\"{}\" stroke=\"{}\" stroke-width=\"2\" fill=\"none\" stroke-dasharray=\"5,4\"/>",
            path(&val),
            VAL_COLOR
        ));
    }
    if let Some(best) = history.best_epoch(metric) {
        let (x, y) = px(best.epoch, best.value);
        body.push_str(&format!(
            "\n<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"5\" fill=\"{}\"/>\n\
             <text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"10\">best epoch = {}</text>",
            x,
            y,
            BEST_COLOR,
            PANEL_W - PAD_R - 90.0,
            16.0,
            BEST_COLOR,
            best.epoch
        ));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::MetricSummary;
    use crate::train::EpochStats;

    fn history() -> TrainingHistory {
        let s = |loss: f64, acc: f64| MetricSummary { loss, accuracy: acc, precision: acc, recall: acc };
        TrainingHistory {
            model: "cnn".into(),
            epochs: (1..=3)
                .map(|e| EpochStats {
                    epoch: e,
                    total_epochs: 3,
                    train: s(1.0 / e as f64, 0.5 + 0.1 * e as f64),
                    val: Some(s(1.2 / e as f64, 0.4 + 0.1 * e as f64)),
                    elapsed_ms: 10,
                })
                .collect(),
        }
    }

    #[test]
    fn chart_has_four_panels_with_best_markers() {
        let svg = training_chart_svg(&history());
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<g transform").count(), 4);
        assert_eq!(svg.matches("best epoch = 3").count(), 4);
        assert_eq!(svg.matches("stroke-dasharray").count(), 4);
    }

    #[test]
    fn empty_history_still_renders() {
        let svg = training_chart_svg(&TrainingHistory::new("x"));
        assert!(svg.contains("no epochs recorded"));
    }
}
