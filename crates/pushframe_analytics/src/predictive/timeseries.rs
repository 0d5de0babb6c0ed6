//! Time series modeling and forecasting. Unlike the other families the
//! fit itself forecasts: the procedure trains the model and writes the
//! forecast into the output table in one pass.

use pushframe_core::call::call_proc_frame_in_out;
use pushframe_core::{ConnectionRef, ProcOutput, Props, RemoteFrame, quote};

use super::{PredictiveModel, ProcSet};
use crate::errors::{AnalyticsError, Result};
use crate::model_manager::ModelManager;
use crate::opt_fn;

const PROCS: ProcSet = ProcSet {
    fit: "TIMESERIES",
    predict: "",
    score: "",
    score_inverted: false,
    id_column_in_output: None,
    target_column_in_output: None,
    has_print_proc: true,
};

/// Parameters for [`TimeSeries::fit_predict`].
#[derive(Debug, Clone)]
pub struct TimeSeriesParams {
    pub out_table: Option<String>,
    pub by_column: Option<String>,
    /// Output table describing the fitted series models.
    pub description_table: Option<String>,
    /// ExponentialSmoothing, ARIMA, SeasonalTrendDecomposition or
    /// SpectralAnalysis.
    pub algorithm: String,
    pub interpolation_method: String,
    pub from_time: Option<String>,
    pub to_time: Option<String>,
    pub forecast_horizon: Option<String>,
    pub forecast_times: Option<String>,
    pub trend: Option<String>,
    pub seasonality: Option<String>,
    pub period: Option<f64>,
    pub unit: Option<String>,
    pub p: Option<i64>,
    pub d: Option<i64>,
    pub q: Option<i64>,
    pub sp: Option<i64>,
    pub sd: Option<i64>,
    pub sq: Option<i64>,
    pub seasonally_adjusted_table: Option<String>,
}

impl Default for TimeSeriesParams {
    fn default() -> Self {
        TimeSeriesParams {
            out_table: None,
            by_column: None,
            description_table: None,
            algorithm: "ExponentialSmoothing".to_string(),
            interpolation_method: "linear".to_string(),
            from_time: None,
            to_time: None,
            forecast_horizon: None,
            forecast_times: None,
            trend: None,
            seasonality: None,
            period: None,
            unit: None,
            p: None,
            d: None,
            q: None,
            sp: None,
            sd: None,
            sq: None,
            seasonally_adjusted_table: None,
        }
    }
}

impl TimeSeriesParams {
    opt_fn!(out_table, String);

    opt_fn!(by_column, String);

    opt_fn!(description_table, String);

    opt_fn!(from_time, String);

    opt_fn!(to_time, String);

    opt_fn!(forecast_horizon, String);

    opt_fn!(forecast_times, String);

    opt_fn!(trend, String);

    opt_fn!(seasonality, String);

    opt_fn!(unit, String);

    opt_fn!(seasonally_adjusted_table, String);

    pub fn algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn interpolation_method(mut self, interpolation_method: impl Into<String>) -> Self {
        self.interpolation_method = interpolation_method.into();
        self
    }

    pub fn period(mut self, period: f64) -> Self {
        self.period = Some(period);
        self
    }

    /// Non-seasonal ARIMA order.
    pub fn arima_order(mut self, p: i64, d: i64, q: i64) -> Self {
        self.p = Some(p);
        self.d = Some(d);
        self.q = Some(q);
        self
    }

    /// Seasonal ARIMA order.
    pub fn seasonal_order(mut self, sp: i64, sd: i64, sq: i64) -> Self {
        self.sp = Some(sp);
        self.sd = Some(sd);
        self.sq = Some(sq);
        self
    }
}

pub struct TimeSeries {
    model: PredictiveModel,
}

impl TimeSeries {
    pub fn new(conn: ConnectionRef, model_name: impl Into<String>) -> Self {
        TimeSeries {
            model: PredictiveModel::new(conn, model_name, PROCS),
        }
    }

    /// Trains the series model and returns the forecast frame it produced.
    pub fn fit_predict(
        &self,
        in_df: &RemoteFrame,
        time_column: &str,
        target_column: &str,
        params: TimeSeriesParams,
    ) -> Result<RemoteFrame> {
        ModelManager::new(self.model.connection().clone()).drop_model(self.model.model_name())?;

        let props = Props::new()
            .set("model", self.model.model_name())
            .set("time", quote(time_column))
            .set("target", quote(target_column))
            .set_opt("by", params.by_column.as_deref().map(quote))
            .set_opt("desctable", params.description_table)
            .set("algorithm", params.algorithm)
            .set("interpolationmethod", params.interpolation_method)
            .set_opt("from", params.from_time)
            .set_opt("to", params.to_time)
            .set_opt("forecasthorizon", params.forecast_horizon)
            .set_opt("forecasttimes", params.forecast_times)
            .set_opt("trend", params.trend)
            .set_opt("seasonality", params.seasonality)
            .set_opt("period", params.period)
            .set_opt("unit", params.unit)
            .set_opt("p", params.p)
            .set_opt("d", params.d)
            .set_opt("q", params.q)
            .set_opt("SP", params.sp)
            .set_opt("SD", params.sd)
            .set_opt("SQ", params.sq)
            .set_opt("seasadjtable", params.seasonally_adjusted_table);

        match call_proc_frame_in_out(
            "TIMESERIES",
            in_df,
            props,
            params.out_table.as_deref(),
            false,
        )? {
            ProcOutput::Frame(df) => Ok(df),
            ProcOutput::Message(_) => Err(AnalyticsError::UnexpectedResult {
                proc: "TIMESERIES".to_string(),
                detail: "no forecast table was produced".to_string(),
            }),
        }
    }

    pub fn describe(&self) -> Result<String> {
        self.model.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushframe_core::TabularResult;
    use pushframe_core::testing::MockConnection;

    #[test]
    fn fit_predict_trains_and_forecasts_in_one_call() {
        let conn = MockConnection::new();
        conn.add_table("SERIES", &[("TS", "TIMESTAMP"), ("V", "DOUBLE")]);
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(false)));
        let df = RemoteFrame::from_table(conn.clone(), "SERIES").unwrap();
        let ts = TimeSeries::new(conn.clone(), "TS1");
        ts.fit_predict(
            &df,
            "TS",
            "V",
            TimeSeriesParams::default()
                .out_table("FORECAST")
                .algorithm("ARIMA")
                .arima_order(2, 1, 1),
        )
        .unwrap();
        let call = conn
            .statements()
            .iter()
            .find(|s| s.contains("call NZA..TIMESERIES("))
            .cloned()
            .unwrap();
        assert!(call.contains("model=TS1"));
        assert!(call.contains("time=\"TS\""));
        assert!(call.contains("algorithm=ARIMA"));
        assert!(call.contains("p=2,d=1,q=1"));
        assert!(call.contains("outtable=FORECAST"));
    }
}
